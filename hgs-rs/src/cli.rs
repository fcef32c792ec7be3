//! Command-line interface.
//!
//! Usage:
//!   hgs [-t] [-D name=value]... [--prelude <file> | --no-prelude] [-v]... [<file>]
//!   hgs [-t] [-D name=value]... -e <code>
//!
//! With neither `<file>` nor `-e` the script is read from standard input.
//! Everything printed by the script is returned as one string.

use std::io::Read;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::config::{self, Config, ConfigError};
use crate::script::{builtins, parse, parse_template, Context, ScriptError};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "hgs", version, about = "Run generator scripts and templates")]
pub struct Cli {
    /// Script or template file; standard input if omitted.
    #[arg(value_name = "FILE", conflicts_with = "eval")]
    pub file: Option<PathBuf>,

    /// Run CODE instead of reading a file.
    #[arg(short, long, value_name = "CODE")]
    pub eval: Option<String>,

    /// Treat the input as template text with `<? ?>` code sections.
    #[arg(short, long)]
    pub template: bool,

    /// Bind NAME to VALUE before the script runs.
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    pub defines: Vec<String>,

    /// Script run before the input (overrides HGS_PRELUDE).
    #[arg(long, value_name = "FILE", conflicts_with = "no_prelude")]
    pub prelude: Option<PathBuf>,

    /// Do not look for a prelude.
    #[arg(long)]
    pub no_prelude: bool,

    /// More logging on stderr (`-v` debug, `-vv` trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{name}: {source}")]
    Script {
        name: String,
        #[source]
        source: ScriptError,
    },

    #[error("cannot read standard input: {0}")]
    Stdin(#[source] std::io::Error),
}

impl Cli {
    /// Resolve the arguments into a [`Config`].
    pub fn config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::new();
        for arg in &self.defines {
            config.define(arg)?;
        }
        if !self.no_prelude {
            config.prelude = config::find_prelude(self.prelude.as_deref());
        }
        config.template = self.template;
        config.verbosity = self.verbose;
        Ok(config)
    }
}

/// Run the selected script under `config` and return what it printed.
pub fn run(cli: &Cli, config: &Config, stdin: impl Read) -> Result<String, CliError> {
    let (name, source) = if let Some(code) = &cli.eval {
        ("<eval>".to_owned(), code.clone())
    } else if let Some(path) = &cli.file {
        (path.display().to_string(), config::read_source(path)?)
    } else {
        let mut text = String::new();
        let mut stdin = stdin;
        stdin.read_to_string(&mut text).map_err(CliError::Stdin)?;
        ("<stdin>".to_owned(), text)
    };

    execute(config, &name, &source)
}

/// Run `source` under `config`: definitions first, then the prelude, then
/// the source itself, all in one root scope.
pub fn execute(config: &Config, name: &str, source: &str) -> Result<String, CliError> {
    let ctx = Context::new();
    builtins::install_standard(&ctx);
    config.apply(&ctx);

    if let Some(path) = &config.prelude {
        let prelude = config::read_source(path)?;
        tracing::debug!(prelude = %path.display(), "running prelude");
        run_source(&ctx, &path.display().to_string(), &prelude, false)?;
    }
    run_source(&ctx, name, source, config.template)?;
    Ok(ctx.output())
}

fn run_source(ctx: &Context, name: &str, source: &str, template: bool) -> Result<(), CliError> {
    let wrap = |source: ScriptError| CliError::Script {
        name: name.to_owned(),
        source,
    };
    let stmt = if template {
        parse_template(source)
    } else {
        parse(source)
    }
    .map_err(|e| wrap(e.into()))?;
    stmt.execute(ctx).map_err(|e| wrap(e.into()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["hgs", "--no-prelude"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn run_cli(cli: &Cli, stdin: impl Read) -> Result<String, CliError> {
        run(cli, &cli.config()?, stdin)
    }

    #[test]
    fn parses_flags() {
        let c = Cli::try_parse_from(["hgs", "-t", "-D", "a=1", "-Db=x", "-vv", "in.hgs"]).unwrap();
        assert!(c.template);
        assert_eq!(c.defines, vec!["a=1", "b=x"]);
        assert_eq!(c.verbose, 2);
        assert_eq!(c.config().unwrap().log_filter(), "trace");
        assert_eq!(c.file, Some(PathBuf::from("in.hgs")));
    }

    #[test]
    fn file_and_eval_conflict() {
        assert!(Cli::try_parse_from(["hgs", "-e", "print(1);", "x.hgs"]).is_err());
        assert!(Cli::try_parse_from(["hgs", "--prelude", "p", "--no-prelude"]).is_err());
    }

    #[test]
    fn eval_with_defines() {
        let c = cli(&["-D", "w=4", "-e", "print(w * 2);"]);
        assert_eq!(run_cli(&c, std::io::empty()).unwrap(), "8");
    }

    #[test]
    fn reads_stdin() {
        let c = cli(&[]);
        let out = run_cli(&c, "print(\"hi\");".as_bytes()).unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn template_mode() {
        let c = cli(&["-t", "-D", "n=3"]);
        let out = run_cli(&c, "x<?= n + 1 ?>y".as_bytes()).unwrap();
        assert_eq!(out, "x4y");
    }

    #[test]
    fn prelude_shares_root_scope() {
        let dir = tempfile::tempdir().unwrap();
        let prelude = dir.path().join("p.hgs");
        std::fs::write(&prelude, "func twice(x) return 2 * x;").unwrap();
        let c = Cli::try_parse_from([
            "hgs",
            "--prelude",
            prelude.to_str().unwrap(),
            "-e",
            "print(twice(21));",
        ])
        .unwrap();
        assert_eq!(run_cli(&c, std::io::empty()).unwrap(), "42");
    }

    #[test]
    fn script_errors_name_their_source() {
        let c = cli(&["-e", "print(nope);"]);
        let err = run_cli(&c, std::io::empty()).unwrap_err();
        assert!(matches!(err, CliError::Script { ref name, .. } if name == "<eval>"));
        assert!(err.to_string().starts_with("<eval>: "));
    }

    #[test]
    fn bad_define() {
        let c = cli(&["-D", "oops", "-e", ""]);
        assert!(matches!(
            run_cli(&c, std::io::empty()),
            Err(CliError::Config(ConfigError::MalformedDefine(_)))
        ));
    }
}
