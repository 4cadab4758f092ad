//! Drive the keybind chain engine from the shell.
//!
//! Examples:
//!   kbchain import ./space.txt --file ./main.json --env space --detect-mirrors
//!   kbchain export --file ./main.json --env ground --out ./ground.txt
//!   kbchain normalize --id main --check
//!   kbchain classify "+STOTrayExecByTray 0 3" "FireAll"
//!   kbchain mirror "A $$ B" --detect
//!   kbchain expand-tray --tray 1
//!
//! Notes:
//! - Profiles are addressed either by a JSON file (`--file`) or by id in the
//!   default store under the user data directory (`--id`).
//! - `--rules` points at a JSON file overriding the key/alias naming rules.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

use keybind_chain_core::chain::detect_mirrored_commands;
use keybind_chain_core::prelude::*;

const APP_ID: &str = "keybind-chain";

// ───────────────────────────── CLI Args ─────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kbchain", version, about = "Parse, normalize and export keybind chains")]
struct Args {
    /// JSON file overriding key/alias naming rules
    #[arg(long, value_name = "PATH", global = true)]
    rules: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ProfileArg {
    /// Profile JSON file
    #[arg(long, value_name = "PATH", conflicts_with = "id")]
    file: Option<PathBuf>,

    /// Profile id in the default store
    #[arg(long)]
    id: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge a keybind file into a profile (created if missing)
    Import {
        /// Keybind file to read
        input: PathBuf,
        #[command(flatten)]
        profile: ProfileArg,
        /// Environment to bind into (defaults to the profile's current one)
        #[arg(long)]
        env: Option<String>,
        /// Collapse mirrored chains and mark them for mirrored export
        #[arg(long)]
        detect_mirrors: bool,
    },
    /// Write one environment of a profile as a keybind file
    Export {
        #[command(flatten)]
        profile: ProfileArg,
        #[arg(long)]
        env: Option<String>,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Skip the header comment block
        #[arg(long)]
        no_header: bool,
    },
    /// Bring a stored profile up to the current schema
    Normalize {
        #[command(flatten)]
        profile: ProfileArg,
        /// Only report whether normalization is needed (fails if it is)
        #[arg(long, conflicts_with = "in_place")]
        check: bool,
        /// Write the result back instead of printing it
        #[arg(long)]
        in_place: bool,
    },
    /// Print the signature of each command
    Classify {
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Mirror a chain, or detect whether it already is mirrored
    Mirror {
        chain: String,
        #[arg(long)]
        detect: bool,
    },
    /// Expand tray slots into tray commands
    ExpandTray {
        #[arg(long)]
        tray: u32,
        /// First slot (whole tray if neither slot bound is given)
        #[arg(long)]
        start_slot: Option<u32>,
        /// Last tray (defaults to --tray)
        #[arg(long)]
        end_tray: Option<u32>,
        /// Last slot
        #[arg(long)]
        end_slot: Option<u32>,
        /// Backup tray walked in lockstep
        #[arg(long)]
        backup_tray: Option<u32>,
        /// Emit explicit inactive commands
        #[arg(long)]
        inactive: bool,
    },
}

// ───────────────────────────── Logger ─────────────────────────────

#[derive(Clone)]
struct StderrLogger {
    verbose: bool,
}

// Stdout is reserved for command output.
impl CoreLog for StderrLogger {
    fn info(&self, msg: &str) {
        eprintln!("INFO:  {msg}");
    }
    fn warn(&self, msg: &str) {
        eprintln!("WARN:  {msg}");
    }
    fn error(&self, msg: &str) {
        eprintln!("ERROR: {msg}");
    }
    fn debug(&self, msg: &str) {
        if self.verbose {
            eprintln!("DEBUG: {msg}");
        }
    }
}

// ───────────────────────────── main ─────────────────────────────

fn main() -> Result<(), String> {
    let args = Args::parse();

    let core_log: Arc<dyn CoreLog> = Arc::new(StderrLogger {
        verbose: args.verbose,
    });
    let rules = load_rules(args.rules.as_deref(), &core_log)?;
    let normalizer = ProfileNormalizer::new().with_logger(&core_log);

    match args.command {
        Command::Import {
            input,
            profile,
            env,
            detect_mirrors,
        } => {
            let (store, id) = open_store(&profile, &core_log)?;
            let text = fs::read_to_string(&input)
                .map_err(|e| format!("read {}: {e}", input.display()))?;

            let parsed = ChainParser::new()
                .with_rules(rules)
                .detect_mirrors(detect_mirrors)
                .with_logger(&core_log)
                .parse(&text);
            for err in &parsed.errors {
                eprintln!("{}:{err}", input.display());
            }

            let mut p = match store.load(&id) {
                Ok(doc) => normalizer
                    .normalize(&doc)
                    .into_profile()
                    .map_err(|e| e.to_string())?
                    .0,
                Err(StoreError::NotFound(_)) => {
                    core_log.info(&format!("creating profile '{id}'"));
                    Profile::new(id.clone())
                }
                Err(e) => return Err(e.to_string()),
            };
            let env = env.unwrap_or_else(|| p.current_environment.clone());
            let merged = p.apply_parse_result(&env, parsed);
            store
                .save(&id, &ProfileDocument::from(p))
                .map_err(|e| e.to_string())?;
            core_log.info(&format!("merged {merged} entries into '{id}' ({env})"));
        }

        Command::Export {
            profile,
            env,
            out,
            no_header,
        } => {
            let (store, id) = open_store(&profile, &core_log)?;
            let (doc, _) = load_normalized(&store, &id, &normalizer).map_err(|e| e.to_string())?;
            let p = Profile::try_from(doc).map_err(|e| e.to_string())?;

            let mut serializer = ChainSerializer::new()
                .header(!no_header)
                .with_rules(rules)
                .with_logger(&core_log);
            if let Some(env) = env {
                serializer = serializer.environment(env);
            }
            let text = serializer.serialize(&p).map_err(|e| e.to_string())?;
            write_output(out.as_deref(), &text)?;
        }

        Command::Normalize {
            profile,
            check,
            in_place,
        } => {
            let (store, id) = open_store(&profile, &core_log)?;
            let doc = store.load(&id).map_err(|e| e.to_string())?;

            if check {
                if needs_normalization(&doc) {
                    return Err(format!("profile '{id}' needs normalization"));
                }
                println!("profile '{id}' is up to date");
                return Ok(());
            }

            if in_place {
                match load_normalized(&store, &id, &normalizer).map_err(|e| e.to_string())? {
                    (_, Some(report)) => print_report(&report),
                    (_, None) => println!("profile '{id}' is up to date"),
                }
            } else {
                let n = normalizer.normalize(&doc);
                print_report(&n.report);
                println!("{}", n.document.to_json()?);
            }
        }

        Command::Classify { commands } => {
            #[derive(Serialize)]
            struct Row<'a> {
                command: &'a str,
                #[serde(flatten)]
                signature: Signature,
            }
            let rows: Vec<Row<'_>> = commands
                .iter()
                .map(|c| Row {
                    command: c,
                    signature: classify(c),
                })
                .collect();
            let json = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
            println!("{json}");
        }

        Command::Mirror { chain, detect } => {
            let commands = split_chain(&chain);
            if detect {
                match detect_mirrored_commands(&commands) {
                    MirrorDetection::Mirrored { original_commands } => {
                        println!("mirrored: {}", join_chain(&original_commands));
                    }
                    MirrorDetection::NotMirrored => println!("not mirrored"),
                }
            } else {
                println!("{}", generate_mirrored(&commands));
            }
        }

        Command::ExpandTray {
            tray,
            start_slot,
            end_tray,
            end_slot,
            backup_tray,
            inactive,
        } => {
            let active = u8::from(!inactive);
            let whole = start_slot.is_none() && end_slot.is_none() && end_tray.is_none();
            let cmds = match (whole, backup_tray) {
                (true, None) => expand_whole_tray(tray, active),
                (true, Some(b)) => expand_whole_tray_with_backup(tray, b, active),
                (false, backup) => {
                    let start = TraySlot::new(tray, start_slot.unwrap_or(0));
                    let end = TraySlot::new(end_tray.unwrap_or(tray), end_slot.unwrap_or(9));
                    match backup {
                        None => expand_tray_range(start, end, active),
                        Some(b) => expand_tray_range_with_backup(
                            start,
                            end,
                            TraySlot::new(b, start.slot),
                            active,
                        ),
                    }
                }
            }
            .map_err(|e| e.to_string())?;
            println!("{}", join_chain(&cmds));
        }
    }
    Ok(())
}

// ───────────────────────────── helpers ─────────────────────────────

fn load_rules(path: Option<&Path>, logger: &Arc<dyn CoreLog>) -> Result<Arc<dyn NameRules>, String> {
    let Some(path) = path else {
        return Ok(Arc::new(DefaultNameRules::default()));
    };
    let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let cfg: NameRulesConfig =
        serde_json::from_str(&text).map_err(|e| format!("parse {}: {e}", path.display()))?;
    let rules = DefaultNameRules::from_config(&cfg)
        .map_err(|e| format!("rules {}: {e}", path.display()))?;
    logger.debug(&format!("naming rules from {}", path.display()));
    Ok(Arc::new(rules))
}

/// Resolve `--file`/`--id` to a store and the profile id inside it.
fn open_store(arg: &ProfileArg, logger: &Arc<dyn CoreLog>) -> Result<(FileProfileStore, String), String> {
    match (&arg.file, &arg.id) {
        (Some(path), _) => {
            if path.extension().is_none_or(|e| e != "json") {
                return Err(format!("{} is not a .json file", path.display()));
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| format!("bad profile path {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Ok((FileProfileStore::new(dir).with_logger(logger), id.to_string()))
        }
        (None, Some(id)) => {
            let store = FileProfileStore::open_default(APP_ID)?.with_logger(logger);
            logger.debug(&format!("store at {}", store.dir().display()));
            Ok((store, id.clone()))
        }
        (None, None) => Err("pass --file <PATH> or --id <ID>".into()),
    }
}

fn write_output(out: Option<&Path>, text: &str) -> Result<(), String> {
    let Some(path) = out else {
        print!("{text}");
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("create output dir {}: {e}", parent.display()))?;
    }
    fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn print_report(report: &NormalizationReport) {
    eprintln!(
        "{} -> {}: steps [{}], changed: {}",
        report.from_version,
        report.to_version,
        report.applied_steps.join(", "),
        report.changed
    );
    let s = &report.stats;
    eprintln!(
        "  migrated {}, legacy shapes {}, strings split {}, aliases removed {}, dropped {}",
        s.items_migrated, s.legacy_shapes_removed, s.strings_split, s.aliases_removed, s.entries_dropped
    );
    for m in &report.malformed {
        eprintln!("  malformed: {m}");
    }
}
