/*!
Command modules.

Each module describes its subcommands as data and exposes one
`commands()` function returning its [`Multiplexer`]:

  src/cmd/
    mod.rs          (this file: the command registry)
    user.rs         (lmi user ...)
    group.rs        (lmi group ...)
    software.rs     (lmi sw ...)
    nevra.rs        (package specifications, rpm version ordering)
    partition.rs    (lmi partition ...)
    storage.rs      (device / partition helpers)

Conventions:
  - Callables take `&dyn Namespace` and never print; listers return rows,
    check-result callables return an `Outcome` whose notes main prints.
  - Every object named on the command line is resolved before the first
    modifying call, so a typo changes nothing.
*/

pub mod group;
pub mod nevra;
pub mod partition;
pub mod software;
pub mod storage;
pub mod user;

use crate::command::{Multiplexer, register_subcommands};

/// The whole `lmi` command tree.
pub fn registry() -> Multiplexer {
    register_subcommands(
        "lmi",
        "OpenLMI command line interface.",
        vec![
            ("user", user::commands().into()),
            ("group", group::commands().into()),
            ("sw", software::commands().into()),
            ("partition", partition::commands().into()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_module_is_registered() {
        let names: Vec<String> = registry()
            .subcommands()
            .iter()
            .map(|c| c.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["user", "group", "sw", "partition"]);
    }

    #[test]
    fn clap_tree_is_consistent() {
        registry().to_clap().debug_assert();
    }

    #[test]
    fn deep_paths_resolve() {
        let tree = registry();
        let m = tree
            .to_clap()
            .try_get_matches_from(["lmi", "sw", "list", "repos", "--all"])
            .unwrap();
        let r = tree.resolve(&m).unwrap();
        assert_eq!(r.command_line(), "lmi sw list repos");
        let opts = r.endpoint.prepare(r.matches).unwrap();
        assert!(opts.flag("_all"));
    }
}
