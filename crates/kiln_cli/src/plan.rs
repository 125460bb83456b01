//! Turning stale sources into compile commands.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use kiln_common::SourcePath;
use kiln_config::{CompileConfig, DefineValue};
use kiln_engine::Command;

/// Compiler flags: the configured base flags followed by `-D` definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<String>,
}

impl Flags {
    /// Starts from the configured flag list.
    pub fn new(base: &[String]) -> Self {
        Self {
            flags: base.to_vec(),
        }
    }

    /// Appends `-D KEY=VALUE`.
    pub fn define(&mut self, key: &str, value: &DefineValue) {
        self.flags.push(format!("-D {key}={value}"));
    }

    /// Appends every definition of `defines`, in key order.
    pub fn define_all(&mut self, defines: &BTreeMap<String, DefineValue>) {
        for (key, value) in defines {
            self.define(key, value);
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flags.join(" "))
    }
}

/// Returns where the object file of `source` goes, relative to the root.
///
/// The source path is re-rooted under `object_dir` and its extension replaced
/// with `object_ext`. Parent-directory components are renamed to `__` so the
/// object never escapes `object_dir`.
pub fn object_path(source: &SourcePath, object_dir: &str, object_ext: &str) -> PathBuf {
    let mut path = PathBuf::from(object_dir);
    for part in source.as_str().split('/') {
        path.push(if part == ".." { "__" } else { part });
    }
    path.set_extension(object_ext);
    path
}

/// One stale source and the command that rebuilds it.
#[derive(Debug, Clone)]
pub struct PlannedCompile {
    /// The object file the command writes, relative to the root.
    pub object: PathBuf,
    /// The expanded command.
    pub command: Command,
}

/// Expands the command template for every stale source.
pub fn plan_compiles(stale: &[SourcePath], compile: &CompileConfig) -> Vec<PlannedCompile> {
    let mut flags = Flags::new(&compile.flags);
    flags.define_all(&compile.defines);
    let flags = flags.to_string();

    stale
        .iter()
        .map(|source| {
            let object = object_path(source, &compile.object_dir, &compile.object_ext);
            let line = expand_template(&compile.command, source.as_str(), &slashed(&object), &flags);
            PlannedCompile {
                object,
                command: Command::for_source(line, source.clone()),
            }
        })
        .collect()
}

/// Substitutes `{source}`, `{object}` and `{flags}` in `template`.
///
/// The two paths are quoted for the shell when they contain anything beyond
/// plain path characters; `flags` is shell text already and goes in as is.
/// Trailing whitespace left by an empty `{flags}` is trimmed.
pub fn expand_template(template: &str, source: &str, object: &str, flags: &str) -> String {
    template
        .replace("{source}", &shell_quote(source))
        .replace("{object}", &shell_quote(object))
        .replace("{flags}", flags)
        .trim_end()
        .to_string()
}

/// Quotes `arg` as a single shell word, leaving plain paths untouched.
pub fn shell_quote(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./+=:@%,".contains(c));
    if plain {
        return Cow::Borrowed(arg);
    }
    if cfg!(windows) {
        Cow::Owned(format!("\"{arg}\""))
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', "'\\''")))
    }
}

/// Creates the parent directory of every planned object under `root`.
pub fn ensure_object_dirs(root: &Path, planned: &[PlannedCompile]) -> std::io::Result<()> {
    for p in planned {
        if let Some(parent) = root.join(&p.object).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn slashed(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(s: &str) -> SourcePath {
        SourcePath::new(s).unwrap()
    }

    #[test]
    fn flags_render_defines_after_base() {
        let mut flags = Flags::new(&["-O2".to_string(), "-Wall".to_string()]);
        flags.define("DEBUG", &DefineValue::Bool(true));
        flags.define("LEVEL", &DefineValue::Integer(3));
        assert_eq!(flags.to_string(), "-O2 -Wall -D DEBUG=1 -D LEVEL=3");
    }

    #[test]
    fn false_define_renders_zero() {
        let mut flags = Flags::default();
        flags.define("TRACE", &DefineValue::Bool(false));
        assert_eq!(flags.to_string(), "-D TRACE=0");
    }

    #[test]
    fn object_path_replaces_extension() {
        assert_eq!(
            object_path(&sp("src/util/io.cpp"), "build", "o"),
            PathBuf::from("build/src/util/io.o")
        );
        assert_eq!(
            object_path(&sp("main.c"), "out/obj", "obj"),
            PathBuf::from("out/obj/main.obj")
        );
    }

    #[test]
    fn object_path_stays_under_object_dir() {
        assert_eq!(
            object_path(&sp("../vendor/z.c"), "build", "o"),
            PathBuf::from("build/__/vendor/z.o")
        );
    }

    #[test]
    fn template_expansion() {
        let line = expand_template("cc -c {source} -o {object} {flags}", "a.c", "build/a.o", "-O2");
        assert_eq!(line, "cc -c a.c -o build/a.o -O2");
    }

    #[test]
    fn empty_flags_leave_no_trailing_space() {
        let line = expand_template("cc -c {source} -o {object} {flags}", "a.c", "build/a.o", "");
        assert_eq!(line, "cc -c a.c -o build/a.o");
    }

    #[cfg(unix)]
    #[test]
    fn paths_with_shell_characters_are_quoted() {
        let line = expand_template(
            "cc -c {source} -o {object} {flags}",
            "src/my file.c",
            "build/src/my file.o",
            "-DNAME='x'",
        );
        assert_eq!(line, "cc -c 'src/my file.c' -o 'build/src/my file.o' -DNAME='x'");
    }

    #[cfg(unix)]
    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("src/a.c"), "src/a.c");
        assert_eq!(shell_quote("$HOME;rm.c"), "'$HOME;rm.c'");
        assert_eq!(shell_quote("it's.c"), "'it'\\''s.c'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn plan_ties_commands_to_sources() {
        let mut compile = CompileConfig::default();
        compile.defines.insert("N".into(), DefineValue::Integer(4));
        let planned = plan_compiles(&[sp("src/a.c"), sp("src/b.cc")], &compile);

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].command.line(), "cc -c src/a.c -o build/src/a.o -D N=4");
        assert_eq!(planned[0].command.source(), Some(&sp("src/a.c")));
        assert_eq!(planned[1].object, PathBuf::from("build/src/b.o"));
    }

    #[test]
    fn object_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let planned = plan_compiles(&[sp("src/deep/a.c")], &CompileConfig::default());
        ensure_object_dirs(dir.path(), &planned).unwrap();
        assert!(dir.path().join("build/src/deep").is_dir());
    }
}
