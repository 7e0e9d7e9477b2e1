use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use tracegraph::{
    compiler::{
        SelectorStrategy, StepMappingConfig, StepMappingOverride, compile,
    },
    locator::{ElementSnapshot, Locator, LocatorEngine},
    page::Page,
    render::render_report,
    service::{CompileService, DirectoryStore, LogNotifier},
    trace::Trace,
};

#[derive(Parser)]
#[command(version, about)]
struct CLI {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print ranked locator candidates for an element of an HTML page.
    Locate {
        #[arg(long)]
        page: PathBuf,
        /// Locator of the element to describe.
        #[arg(long)]
        target: String,
        #[arg(long, value_enum, default_value_t = TargetKind::Css)]
        kind: TargetKind,
    },
    /// Compile a trace file into an n8n workflow.
    Compile {
        #[arg(long)]
        trace: PathBuf,
        /// Where to write the workflow JSON. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Workflow name. Defaults to the trace file's stem.
        #[arg(long)]
        name: Option<String>,
        /// Print a compilation report to stderr.
        #[arg(long, default_value_t = false)]
        report: bool,
        #[command(flatten)]
        config: ConfigFlags,
    },
    /// Compile a workflow kept in a directory store.
    CompileWorkflow {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        id: String,
        #[command(flatten)]
        config: ConfigFlags,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum TargetKind {
    Css,
    Xpath,
    Text,
    Role,
}

#[derive(clap::Args)]
struct ConfigFlags {
    /// JSON config file; fields it leaves out keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    no_retries: bool,
    #[arg(long)]
    max_retries: Option<u32>,
    #[arg(long)]
    wait_between_retries: Option<u64>,
    #[arg(long, default_value_t = false)]
    screenshots: bool,
    #[arg(long, default_value_t = false)]
    no_error_recovery: bool,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    selector_strategy: Option<SelectorStrategy>,
}

impl ConfigFlags {
    fn base(&self) -> Result<StepMappingConfig> {
        match &self.config {
            Some(path) => StepMappingConfig::from_file(path),
            None => Ok(StepMappingConfig::default()),
        }
    }

    fn overrides(&self) -> StepMappingOverride {
        StepMappingOverride {
            enable_retries: self.no_retries.then_some(false),
            max_retries: self.max_retries,
            wait_between_retries: self.wait_between_retries,
            enable_screenshots: self.screenshots.then_some(true),
            enable_error_recovery: self.no_error_recovery.then_some(false),
            timeout_ms: self.timeout_ms,
            selector_strategy: self.selector_strategy,
        }
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .init();
    let cli = CLI::parse();
    match cli.command {
        Command::Locate { page, target, kind } => {
            let html = std::fs::read_to_string(&page)
                .with_context(|| format!("could not read {}", page.display()))?;
            let page = Page::parse(&html)?;
            let locator = match kind {
                TargetKind::Css => Locator::css(target),
                TargetKind::Xpath => Locator::xpath(target),
                TargetKind::Text => Locator::text(target),
                TargetKind::Role => Locator::role(target),
            };
            let matches = page.query(&locator)?;
            let Some(node) = matches.first().copied() else {
                bail!("{} matched no elements", locator);
            };
            if matches.len() > 1 {
                log::warn!(
                    "{} matched {} elements, describing the first",
                    locator,
                    matches.len()
                );
            }
            let element = ElementSnapshot::capture(&page, node)?;
            let candidates = LocatorEngine::default().extract(&element, &page)?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            Ok(())
        }
        Command::Compile {
            trace,
            output,
            name,
            report,
            config,
        } => {
            let contents = std::fs::read_to_string(&trace)
                .with_context(|| format!("could not read {}", trace.display()))?;
            let steps: Trace = serde_json::from_str(&contents)
                .with_context(|| format!("invalid trace in {}", trace.display()))?;
            let mapping = config.base()?.with(&config.overrides());
            let result = compile(&steps, &mapping);
            if report || !result.success {
                eprint!("{}", render_report(&result));
            }
            let Some(graph) = &result.graph else {
                std::process::exit(2);
            };
            let name = name.unwrap_or_else(|| {
                trace
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "workflow".to_string())
            });
            let workflow =
                serde_json::to_string_pretty(&graph.to_workflow_json(&name))?;
            match output {
                Some(path) => std::fs::write(&path, workflow).with_context(
                    || format!("could not write {}", path.display()),
                )?,
                None => println!("{}", workflow),
            }
            Ok(())
        }
        Command::CompileWorkflow { store, id, config } => {
            let service = CompileService::new(
                DirectoryStore::new(store),
                LogNotifier,
                config.base()?,
            );
            let result = service.compile(&id, Some(&config.overrides()))?;
            print!("{}", render_report(&result));
            if !result.success {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}
