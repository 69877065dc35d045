use crate::config::{Command, InstanceArg};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracefs_core::{list_instances_in, Instance};
use tracing::{debug, info};

/// How a successfully executed command should exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The command ran but the thing it asked about is absent
    Missing,
}

fn open_instance(tracing_dir: &Path, selector: &InstanceArg) -> Result<Instance> {
    let name = selector.instance.as_deref();
    Instance::attach(Some(tracing_dir), name).with_context(|| match name {
        Some(name) => format!("Cannot open instance '{name}'"),
        None => format!("Cannot open tracing directory {}", tracing_dir.display()),
    })
}

/// Execute a subcommand against an already resolved tracing directory.
pub fn execute(command: &Command, tracing_dir: &Path, out: &mut impl Write) -> Result<Outcome> {
    match command {
        Command::Root { .. } => {
            writeln!(out, "{}", tracing_dir.display())?;
        }
        Command::Instances => {
            for name in list_instances_in(tracing_dir)
                .with_context(|| format!("Cannot list instances in {}", tracing_dir.display()))?
            {
                writeln!(out, "{name}")?;
            }
        }
        Command::Create { name, keep } => {
            let inst = Instance::create_in(tracing_dir, name)
                .with_context(|| format!("Failed to create instance '{name}'"))?;
            let state = if inst.is_new() { "created" } else { "exists" };
            writeln!(out, "{}: {}", state, inst.dir()?.display())?;
            if *keep {
                // Dropping without destroy leaves the directory in place
                info!("Keeping instance {}", name);
            } else {
                inst.destroy();
            }
        }
        Command::Remove { name } => {
            let inst = Instance::attach(Some(tracing_dir), Some(name))
                .with_context(|| format!("Cannot open instance '{name}'"))?;
            inst.remove()
                .with_context(|| format!("Failed to remove instance '{name}'"))?;
            info!("Removed instance {}", name);
        }
        Command::Read { instance, file } => {
            let inst = open_instance(tracing_dir, instance)?;
            let buf = inst
                .read_file(file)
                .with_context(|| format!("Failed to read {file}"))?;
            debug!("Read {} bytes from {}", buf.len(), file);
            out.write_all(buf.as_bytes())?;
        }
        Command::Write {
            instance,
            append,
            file,
            content,
        } => {
            let inst = open_instance(tracing_dir, instance)?;
            let res = if *append {
                inst.append_file(file, content)
            } else {
                inst.write_file(file, content)
            };
            res.with_context(|| format!("Failed to write {file}"))?;
        }
        Command::Clear { instance, file } => {
            let inst = open_instance(tracing_dir, instance)?;
            inst.clear_file(file)
                .with_context(|| format!("Failed to clear {file}"))?;
        }
        Command::Clock { instance } => {
            let inst = open_instance(tracing_dir, instance)?;
            let clock = inst.clock().context("Failed to read the trace clock")?;
            writeln!(out, "{clock}")?;
        }
        Command::Exists {
            instance,
            dir,
            name,
        } => {
            let inst = open_instance(tracing_dir, instance)?;
            let found = if *dir {
                inst.dir_exists(name)
            } else {
                inst.file_exists(name)
            };
            writeln!(out, "{found}")?;
            if !found {
                return Ok(Outcome::Missing);
            }
        }
        Command::Marker { instance, message } => {
            let mut inst = open_instance(tracing_dir, instance)?;
            inst.write_marker(message)
                .context("Failed to write trace marker")?;
            inst.close_held(tracefs_core::HeldFile::Marker);
        }
    }
    Ok(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tracing_root() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("instances")).unwrap();
        fs::write(dir.path().join("trace_clock"), "local [global] mono\n").unwrap();
        fs::write(dir.path().join("trace_marker"), "").unwrap();
        dir
    }

    fn run(command: Command, root: &Path) -> (Result<Outcome>, String) {
        let mut out = Vec::new();
        let res = execute(&command, root, &mut out);
        (res, String::from_utf8(out).unwrap())
    }

    fn top() -> InstanceArg {
        InstanceArg::default()
    }

    #[test]
    fn test_create_without_keep_cleans_up() {
        let root = tracing_root();
        let (res, out) = run(
            Command::Create {
                name: "foo".to_string(),
                keep: false,
            },
            root.path(),
        );
        assert_eq!(res.unwrap(), Outcome::Success);
        assert!(out.starts_with("created: "), "{out}");
        assert!(!root.path().join("instances/foo").exists());
    }

    #[test]
    fn test_create_keep_then_list_and_remove() {
        let root = tracing_root();
        let create = |name: &str| Command::Create {
            name: name.to_string(),
            keep: true,
        };
        run(create("b"), root.path()).0.unwrap();
        run(create("a"), root.path()).0.unwrap();

        let (res, out) = run(create("a"), root.path());
        res.unwrap();
        assert!(out.starts_with("exists: "), "{out}");

        let (res, out) = run(Command::Instances, root.path());
        res.unwrap();
        assert_eq!(out, "a\nb\n");

        run(
            Command::Remove {
                name: "a".to_string(),
            },
            root.path(),
        )
        .0
        .unwrap();
        assert!(!root.path().join("instances/a").exists());
        assert!(root.path().join("instances/b").is_dir());
    }

    #[test]
    fn test_write_append_read_clear() {
        let root = tracing_root();
        fs::write(root.path().join("set_event"), "").unwrap();
        let write = |append: bool, content: &str| Command::Write {
            instance: top(),
            append,
            file: "set_event".to_string(),
            content: content.to_string(),
        };
        run(write(false, "schedule"), root.path()).0.unwrap();
        // Append skips truncation; a regular file takes the bytes at offset 0
        run(write(true, "SCHED"), root.path()).0.unwrap();

        let read = Command::Read {
            instance: top(),
            file: "set_event".to_string(),
        };
        let (res, out) = run(read.clone(), root.path());
        res.unwrap();
        assert_eq!(out, "SCHEDule");

        run(
            Command::Clear {
                instance: top(),
                file: "set_event".to_string(),
            },
            root.path(),
        )
        .0
        .unwrap();
        let (res, out) = run(read, root.path());
        res.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_does_not_create_files() {
        let root = tracing_root();
        let (res, _) = run(
            Command::Write {
                instance: top(),
                append: false,
                file: "no_such_file".to_string(),
                content: "1".to_string(),
            },
            root.path(),
        );
        let err = format!("{:#}", res.unwrap_err());
        assert!(err.contains("Failed to write no_such_file"), "{err}");
        assert!(!root.path().join("no_such_file").exists());
    }

    #[test]
    fn test_clock_and_marker_in_instance() {
        let root = tracing_root();
        let inst_dir = root.path().join("instances/foo");
        fs::create_dir(&inst_dir).unwrap();
        fs::write(inst_dir.join("trace_clock"), "[local] global\n").unwrap();
        fs::write(inst_dir.join("trace_marker"), "").unwrap();
        let foo = InstanceArg {
            instance: Some("foo".to_string()),
        };

        let (res, out) = run(Command::Clock { instance: foo.clone() }, root.path());
        res.unwrap();
        assert_eq!(out, "local\n");

        let (res, out) = run(Command::Clock { instance: top() }, root.path());
        res.unwrap();
        assert_eq!(out, "global\n");

        run(
            Command::Marker {
                instance: foo,
                message: "hello".to_string(),
            },
            root.path(),
        )
        .0
        .unwrap();
        assert_eq!(fs::read_to_string(inst_dir.join("trace_marker")).unwrap(), "hello");
    }

    #[test]
    fn test_exists_reports_missing() {
        let root = tracing_root();
        let exists = |dir: bool, name: &str| Command::Exists {
            instance: top(),
            dir,
            name: name.to_string(),
        };

        let (res, out) = run(exists(true, "instances"), root.path());
        assert_eq!(res.unwrap(), Outcome::Success);
        assert_eq!(out, "true\n");

        let (res, out) = run(exists(false, "instances"), root.path());
        assert_eq!(res.unwrap(), Outcome::Missing);
        assert_eq!(out, "false\n");
    }

    #[test]
    fn test_unknown_instance_is_an_error() {
        let root = tracing_root();
        let (res, _) = run(
            Command::Read {
                instance: InstanceArg {
                    instance: Some("ghost".to_string()),
                },
                file: "trace".to_string(),
            },
            root.path(),
        );
        let err = format!("{:#}", res.unwrap_err());
        assert!(err.contains("Cannot open instance 'ghost'"), "{err}");
    }
}
