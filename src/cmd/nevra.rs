//! Package specifications and rpm version ordering.
//!
//! Accepted notations:
//!
//! ```text
//! <name>
//! <name>.<arch>
//! <name>-<epoch>:<version>-<release>.<arch>
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::cim::Instance;
use crate::error::{Error, Result};

const ARCHES: &[&str] = &[
    "noarch", "x86_64", "i386", "i486", "i586", "i686", "athlon", "aarch64", "armv7hl", "armv7hnl",
    "ppc", "ppc64", "ppc64le", "s390", "s390x", "src",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    raw: String,
    pub name: String,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub arch: Option<String>,
}

impl PackageSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || Error::invalid(format!("invalid package specification \"{raw}\""));
        let mut spec = Self {
            raw: raw.to_string(),
            name: String::new(),
            epoch: None,
            version: None,
            release: None,
            arch: None,
        };

        if raw.contains(':') {
            let (rest, arch) = raw.rsplit_once('.').ok_or_else(invalid)?;
            let (rest, release) = rest.rsplit_once('-').ok_or_else(invalid)?;
            let (rest, version) = rest.rsplit_once(':').ok_or_else(invalid)?;
            let (name, epoch) = rest.rsplit_once('-').ok_or_else(invalid)?;
            let parts = [name, epoch, version, release, arch];
            if parts.iter().any(|p| p.is_empty()) || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            spec.name = name.to_string();
            spec.epoch = Some(epoch.to_string());
            spec.version = Some(version.to_string());
            spec.release = Some(release.to_string());
            spec.arch = Some(arch.to_string());
            return Ok(spec);
        }

        match raw.rsplit_once('.') {
            Some((name, arch)) if ARCHES.contains(&arch) && !name.is_empty() => {
                spec.name = name.to_string();
                spec.arch = Some(arch.to_string());
            }
            _ => spec.name = raw.to_string(),
        }
        if spec.name.is_empty() {
            return Err(invalid());
        }
        Ok(spec)
    }

    /// Whether a `LMI_SoftwareIdentity` instance satisfies every given field.
    pub fn matches(&self, pkg: &Instance) -> bool {
        let field = |want: &Option<String>, have: String| want.as_ref().is_none_or(|w| *w == have);
        pkg.text("Name") == self.name
            && field(&self.epoch, epoch(pkg))
            && field(&self.version, pkg.text("Version"))
            && field(&self.release, pkg.text("Release"))
            && field(&self.arch, pkg.text("Architecture"))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub fn epoch(pkg: &Instance) -> String {
    pkg.string("Epoch").unwrap_or_else(|| "0".to_string())
}

/// `name-epoch:version-release.arch` of a software identity.
pub fn nevra(pkg: &Instance) -> String {
    format!(
        "{}-{}:{}-{}.{}",
        pkg.text("Name"),
        epoch(pkg),
        pkg.text("Version"),
        pkg.text("Release"),
        pkg.text("Architecture")
    )
}

/// rpm's segment-wise version comparison.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let separator = |c: char| !c.is_ascii_alphanumeric() && c != '~';
    let (mut a, mut b) = (a, b);
    loop {
        a = a.trim_start_matches(separator);
        b = b.trim_start_matches(separator);

        match (a.starts_with('~'), b.starts_with('~')) {
            (true, true) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        if a.is_empty() || b.is_empty() {
            break;
        }

        let numeric = a.starts_with(|c: char| c.is_ascii_digit());
        let segment_end = |s: &str| {
            s.find(|c: char| {
                if numeric {
                    !c.is_ascii_digit()
                } else {
                    !c.is_ascii_alphabetic()
                }
            })
            .unwrap_or(s.len())
        };
        let (seg_a, rest_a) = a.split_at(segment_end(a));
        let (seg_b, rest_b) = b.split_at(segment_end(b));
        if seg_b.is_empty() {
            // numeric segments are newer than alphabetic ones
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let seg_a = seg_a.trim_start_matches('0');
            let seg_b = seg_b.trim_start_matches('0');
            seg_a.len().cmp(&seg_b.len()).then_with(|| seg_a.cmp(seg_b))
        } else {
            seg_a.cmp(seg_b)
        };
        if ord != Ordering::Equal {
            return ord;
        }
        a = rest_a;
        b = rest_b;
    }
    a.len().cmp(&b.len())
}

/// Order two identities by epoch, version and release.
pub fn compare_evr(a: &Instance, b: &Instance) -> Ordering {
    let num = |p: &Instance| epoch(p).parse::<u64>().unwrap_or(0);
    num(a)
        .cmp(&num(b))
        .then_with(|| rpmvercmp(&a.text("Version"), &b.text("Version")))
        .then_with(|| rpmvercmp(&a.text("Release"), &b.text("Release")))
}
