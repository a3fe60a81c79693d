use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checker;
use crate::config::{self, Config};
use crate::daemon::{Pipeline, PipelineOptions};
use crate::dispatch::{ActionExecutor, JsonLinesExecutor, LoggingExecutor};
use crate::rules::{self, RuleBook};
use crate::window::{ScriptedWindows, WindowDescriptor, WindowScript};

use super::exit_codes;
use super::output::{
    self, CheckData, OutputMode, ReplayData, RuleSummary, RulesListData, RulesVerifyData,
};

#[derive(Parser)]
#[command(name = "deskrules")]
#[command(about = "Move newly visible windows to virtual desktops by rule")]
#[command(version)]
pub struct Cli {
    /// Path to config file (overrides DESKRULES_CONFIG env var and default location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (auto-enabled when stdout is piped)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Force text output even when stdout is piped
    #[arg(long, global = true, conflicts_with = "json")]
    pub no_json: bool,

    /// Suppress all output on success (errors still go to stderr)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and dry-run the rules of the active profile
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },

    /// Run the rule pipeline over a scripted window session
    ///
    /// every executed action is printed to stdout as one JSON object per line
    Replay {
        /// Window script (JSON)
        script: PathBuf,

        /// Rule file to use instead of the active profile's
        #[arg(long)]
        path: Option<PathBuf>,

        /// Log executed actions at info level instead of printing them
        #[arg(long)]
        log_only: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in declaration order
    List {
        /// Rule file to use instead of the active profile's
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Report every problem in the rule file
    Verify {
        /// Rule file to use instead of the active profile's
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show which actions the rules would emit for one window
    Check {
        /// Window descriptor as JSON, or @file to read it from a file
        #[arg(short, long)]
        window: String,

        /// Rule file to use instead of the active profile's
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "checker.match_policy")
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset configuration to defaults
    Reset,
    /// Verify configuration file for errors
    Verify,
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = config::get_config_path(cli.config.as_deref())?;
    let output_mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet);

    match cli.command {
        Commands::Rules { command } => {
            let config = load_config(&config_path, output_mode);

            match command {
                RulesCommands::List { path } => {
                    let path = resolve_rules_path(path, &config)?;
                    let templates = rules::load(&path).unwrap_or_else(|e| {
                        exit_with(output_mode, exit_codes::RULES_ERROR, &e.to_string(), vec![])
                    });

                    if output_mode.is_json() {
                        output::print_json(&RulesListData {
                            profile: config.current_profile_name.clone(),
                            path: path.display().to_string(),
                            rules: templates.iter().map(RuleSummary::from).collect(),
                        });
                    } else if !output_mode.is_quiet() {
                        if templates.is_empty() {
                            println!("No rules configured in {}", path.display());
                        }
                        for (i, rule) in templates.iter().enumerate() {
                            let state = if rule.enabled { "" } else { " (disabled)" };
                            println!("{:>3}. {}{}: {}", i + 1, rule.name, state, rule.action);
                            println!("     {}", rule.expression);
                        }
                    }
                    Ok(())
                }

                RulesCommands::Verify { path } => {
                    let path = resolve_rules_path(path, &config)?;
                    let problems = rules::verify(&path).unwrap_or_else(|e| {
                        exit_with(output_mode, exit_codes::RULES_ERROR, &e.to_string(), vec![])
                    });

                    if problems.is_empty() {
                        if output_mode.is_json() {
                            output::print_json(&RulesVerifyData::new(
                                path.display().to_string(),
                                &problems,
                            ));
                        } else if !output_mode.is_quiet() {
                            println!("✓ Rules are valid: {}", path.display());
                        }
                        return Ok(());
                    }

                    exit_with(
                        output_mode,
                        exit_codes::RULES_ERROR,
                        &format!(
                            "rule file has {} problem(s): {}",
                            problems.len(),
                            path.display()
                        ),
                        problems.iter().map(|p| p.to_string()).collect(),
                    )
                }

                RulesCommands::Check { window, path } => {
                    let window = parse_window_arg(&window).unwrap_or_else(|e| {
                        exit_with(
                            output_mode,
                            exit_codes::INVALID_ARGS,
                            &format!("{:#}", e),
                            vec![],
                        )
                    });
                    let path = resolve_rules_path(path, &config)?;
                    let book = RuleBook::open(&path).unwrap_or_else(|e| {
                        exit_with(output_mode, exit_codes::RULES_ERROR, &e.to_string(), vec![])
                    });

                    let actions = checker::evaluate(
                        &book.snapshot(),
                        &window,
                        config.checker.match_policy,
                    );

                    if output_mode.is_json() {
                        output::print_json(&CheckData {
                            window: &window,
                            actions: &actions,
                        });
                    } else if !output_mode.is_quiet() {
                        if actions.is_empty() {
                            println!("No rule matched {}", window.label());
                        }
                        for spec in &actions {
                            println!("{}: {}", spec.rule_name, spec.action);
                        }
                    }

                    if actions.is_empty() {
                        std::process::exit(exit_codes::NO_MATCH);
                    }
                    Ok(())
                }
            }
        }

        Commands::Replay {
            script,
            path,
            log_only,
        } => {
            let config = load_config(&config_path, output_mode);
            let path = resolve_rules_path(path, &config)?;
            let script = WindowScript::load(&script).unwrap_or_else(|e| {
                exit_with(
                    output_mode,
                    exit_codes::INVALID_ARGS,
                    &format!("{:#}", e),
                    vec![],
                )
            });
            let book = RuleBook::open(&path).unwrap_or_else(|e| {
                exit_with(output_mode, exit_codes::RULES_ERROR, &e.to_string(), vec![])
            });

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let book = Arc::new(book);
            let options = PipelineOptions::from_config(&config);
            let summary = if log_only {
                runtime.block_on(replay(script, book, options, LoggingExecutor))
            } else {
                let executor = JsonLinesExecutor::new(std::io::stdout());
                runtime.block_on(replay(script, book, options, executor))
            };

            if !output_mode.is_quiet() {
                eprintln!("{}", summary);
            }
            Ok(())
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = load_config(&config_path, output_mode);
                if output_mode.is_json() {
                    output::print_json(&config);
                } else {
                    let json = serde_json::to_string_pretty(&config)
                        .context("Failed to serialize config")?;
                    println!("{}", json);
                }
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                let mut config = load_config(&config_path, output_mode);
                if let Err(e) = config::set_value(&mut config, &key, &value) {
                    exit_with(output_mode, exit_codes::INVALID_ARGS, &e.to_string(), vec![]);
                }
                config::save_to(&config_path, &config)?;
                if !output_mode.is_quiet() && !output_mode.is_json() {
                    println!("Set {} = {}", key, value);
                }
                Ok(())
            }
            ConfigCommands::Reset => {
                config::save_to(&config_path, &Config::default())?;
                if !output_mode.is_quiet() && !output_mode.is_json() {
                    println!("Configuration reset to defaults");
                }
                Ok(())
            }
            ConfigCommands::Verify => {
                let errors = config::verify(&config_path).unwrap_or_else(|e| {
                    exit_with(output_mode, exit_codes::CONFIG_ERROR, &e.to_string(), vec![])
                });

                if errors.is_empty() {
                    if !output_mode.is_quiet() && !output_mode.is_json() {
                        println!("✓ Configuration is valid: {}", config_path.display());
                    }
                    return Ok(());
                }

                exit_with(
                    output_mode,
                    exit_codes::CONFIG_ERROR,
                    &format!(
                        "configuration has {} error(s): {}",
                        errors.len(),
                        config_path.display()
                    ),
                    errors,
                )
            }
        },
    }
}

/// feed the scripted events into a pipeline at their scripted times and
/// wait until every check and action is done
async fn replay<E: ActionExecutor>(
    script: WindowScript,
    book: Arc<RuleBook>,
    options: PipelineOptions,
    executor: E,
) -> ReplayData {
    let windows = Arc::new(ScriptedWindows::new(script));
    let events = windows.script().events();
    let end_ms = windows.script().duration_ms();

    let pipeline = Pipeline::start(
        options,
        book,
        windows.clone(),
        windows.clone(),
        executor,
    );

    for (at_ms, event) in &events {
        windows.sleep_until(*at_ms).await;
        pipeline.push(event.clone());
    }
    // title changes and closes after the last event still count
    windows.sleep_until(end_ms).await;

    let report = pipeline.finish().await;
    ReplayData {
        events: events.len(),
        executed: report.actions.executed,
        failed: report.actions.failed,
        windows: report.stats.windows,
    }
}

/// load the config and start logging at its level
///
/// a broken config is fatal for every command that reads it
fn load_config(path: &Path, mode: OutputMode) -> Config {
    let config = config::load_from(path).unwrap_or_else(|e| {
        exit_with(mode, exit_codes::CONFIG_ERROR, &format!("{:#}", e), vec![])
    });
    super::init_logging(&config.log.level);
    config
}

fn resolve_rules_path(path: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => config::rules_path(config),
    }
}

/// `--window` accepts inline JSON or `@path` to a JSON file
fn parse_window_arg(arg: &str) -> Result<WindowDescriptor> {
    let content = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read window file: {}", path))?,
        None => arg.to_string(),
    };

    let window: WindowDescriptor =
        serde_json::from_str(&content).context("Invalid window descriptor")?;
    if window.process_name.is_empty() && window.title.is_empty() {
        return Err(anyhow!("window descriptor needs a title or a process_name"));
    }
    Ok(window)
}

/// report an error in the current output mode and exit with `code`
pub(super) fn exit_with(mode: OutputMode, code: i32, message: &str, problems: Vec<String>) -> ! {
    if mode.is_json() {
        output::print_json_error_with_problems(code, message, problems);
    } else {
        eprintln!("Error: {}", message);
        for problem in &problems {
            eprintln!("  - {}", problem);
        }
    }
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rules_check() {
        let cli = Cli::try_parse_from([
            "deskrules",
            "--json",
            "rules",
            "check",
            "--window",
            r#"{"title":"x"}"#,
            "--path",
            "/tmp/r.json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Rules {
                command: RulesCommands::Check { window, path },
            } => {
                assert_eq!(window, r#"{"title":"x"}"#);
                assert_eq!(path, Some(PathBuf::from("/tmp/r.json")));
            }
            _ => panic!("expected rules check"),
        }
    }

    #[test]
    fn test_json_and_no_json_conflict() {
        assert!(Cli::try_parse_from(["deskrules", "--json", "--no-json", "config", "path"]).is_err());
    }

    #[test]
    fn test_parse_window_arg_inline() {
        let window = parse_window_arg(
            r#"{"handle":5,"title":"Untitled - Notepad","process_name":"notepad.exe"}"#,
        )
        .unwrap();

        assert_eq!(window.title, "Untitled - Notepad");
        assert_eq!(window.screen_index, "0");
        assert_eq!(window.command_line, None);
    }

    #[test]
    fn test_parse_window_arg_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("window.json");
        std::fs::write(&file, r#"{"process_name":"code.exe"}"#).unwrap();

        let window = parse_window_arg(&format!("@{}", file.display())).unwrap();
        assert_eq!(window.process_name, "code.exe");
    }

    #[test]
    fn test_parse_window_arg_rejects_empty() {
        assert!(parse_window_arg("{}").is_err());
        assert!(parse_window_arg("not json").is_err());
        assert!(parse_window_arg("@/definitely/not/here.json").is_err());
    }
}
