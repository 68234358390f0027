//! PromptKit CLI - prompt templates and chains from the command line.
//!
//! Renders curated and custom templates, runs multi-step chains through an
//! external command, adapts prompts for a target model, and manages
//! favorites and variable history stored under `.promptkit/`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use promptkit_core::adapter::apply_context_adaptations;
use promptkit_core::chain::{create_simple_chain, execute_chain};
use promptkit_core::variables::create_variable_definitions;
use promptkit_core::{
    AdaptationOptions, ChainResult, Enhancer, HistoryStore, KvStore, OutputFormat,
    PromptKitConfig, TargetModel, Template, TemplateCategory, TemplateService, UserTemplateData,
    VariableContext,
};
use promptkit_pm::PromptManager;
use std::path::PathBuf;
use tracing::{debug, error};

mod executor;

use executor::{CliExecutor, CommandExecutor, EchoExecutor};

/// PromptKit - prompt templating and chain execution
#[derive(Parser)]
#[command(name = "promptkit", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Project root holding `.promptkit/` (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Keep favorites, custom templates and history in memory only
    #[arg(long, global = true)]
    memory: bool,
}

/// Available PromptKit commands
#[derive(Subcommand)]
enum Commands {
    /// List templates
    List {
        /// Only templates in this category
        #[arg(short, long)]
        category: Option<TemplateCategory>,

        /// Case-insensitive search over name, description and tags
        #[arg(short, long)]
        search: Option<String>,

        /// Only favorite templates
        #[arg(short, long)]
        favorites: bool,
    },

    /// Show a template as JSON
    Show {
        /// Template id
        id: String,
    },

    /// Print the variable definitions derived from template text
    Vars {
        /// Template text containing `{name}` placeholders
        template: String,
    },

    /// Render a template
    Render {
        /// Template id
        id: String,

        #[command(flatten)]
        values: ValueArgs,

        #[command(flatten)]
        adapt: AdaptArgs,
    },

    /// Run a chained template through an executor
    Chain {
        /// Template id
        id: String,

        #[command(flatten)]
        values: ValueArgs,

        #[command(flatten)]
        exec: ExecArgs,

        #[command(flatten)]
        adapt: AdaptArgs,
    },

    /// Run prompts as a linear chain, each step reading `{stepNOutput}` of the previous one
    SimpleChain {
        /// Step prompts, in order
        #[arg(required = true)]
        prompts: Vec<String>,

        #[command(flatten)]
        values: ValueArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Adapt free text for a model and output format
    Adapt {
        /// Prompt text
        text: String,

        #[command(flatten)]
        adapt: AdaptArgs,
    },

    /// Show recently used values for a variable
    Suggest {
        /// Variable name
        name: String,

        /// Maximum number of suggestions
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage favorite templates
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },

    /// Export favorites, custom templates and variable history as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import data previously written by `export`
    Import {
        /// JSON file to import
        file: PathBuf,
    },

    /// Enhance a rough prompt in one step
    Enhance {
        /// Prompt text
        prompt: String,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Generate clarifying questions for a rough prompt
    Questions {
        /// Prompt text
        prompt: String,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Enhance a rough prompt using answers to its clarifying questions
    Refine {
        /// Prompt text
        prompt: String,

        /// Answered question as `question=answer` (repeatable, kept in order)
        #[arg(short, long = "answer", value_name = "QUESTION=ANSWER", value_parser = parse_key_value)]
        answers: Vec<(String, String)>,

        #[command(flatten)]
        exec: ExecArgs,
    },
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// Mark a template as favorite
    Add { id: String },
    /// Unmark a favorite template
    Remove { id: String },
}

#[derive(Args)]
struct ValueArgs {
    /// Variable value as `name=value` (repeatable)
    #[arg(short = 'v', long = "var", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,
}

#[derive(Args)]
struct AdaptArgs {
    /// Target model
    #[arg(short, long)]
    model: Option<TargetModel>,

    /// Requested output format
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Strip filler phrases and redundant whitespace
    #[arg(long)]
    optimize: bool,
}

impl AdaptArgs {
    /// `None` when no flag was given, so the configured default applies.
    fn options(&self) -> Option<AdaptationOptions> {
        let options = AdaptationOptions {
            model: self.model,
            format: self.format,
            optimize_tokens: self.optimize,
        };
        (!options.is_noop()).then_some(options)
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ExecArgs {
    /// Shell command that reads a prompt on stdin and prints the response
    #[arg(long, value_name = "CMD")]
    exec: Option<String>,

    /// Echo prompts back instead of calling a provider
    #[arg(long)]
    echo: bool,
}

impl ExecArgs {
    fn executor(&self) -> CliExecutor {
        match &self.exec {
            Some(command) => CliExecutor::Command(CommandExecutor::new(command)),
            None => CliExecutor::Echo(EchoExecutor),
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    if name.trim().is_empty() {
        return Err(format!("empty variable name in `{s}`"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing subscriber
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = run(cli).await {
        // Log with tracing
        error!("Command failed: {:#}", e);
        // Also print to stderr for CLI users
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing subscriber for structured logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("promptkit_cli=debug,promptkit_core=debug,promptkit_pm=debug")
    } else {
        EnvFilter::new("promptkit_cli=warn,promptkit_core=warn,promptkit_pm=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = PromptKitConfig::load(root).context("Failed to load PromptKit configuration")?;
    debug!(root = %config.root.display(), memory = cli.memory, "loaded configuration");

    if cli.memory {
        let service = TemplateService::in_memory()
            .context("Failed to create template service")?
            .with_config(&config);
        run_command(&service, &config, cli.command).await
    } else {
        let service = TemplateService::open(&config).context("Failed to create template service")?;
        run_command(&service, &config, cli.command).await
    }
}

/// Execute the specified command
async fn run_command<S: KvStore, H: HistoryStore>(
    service: &TemplateService<S, H>,
    config: &PromptKitConfig,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::List {
            category,
            search,
            favorites,
        } => {
            let mut templates = match &search {
                Some(query) => service.catalog().search_templates(query),
                None => service.catalog().all_templates(),
            };
            if favorites {
                templates.retain(|t| service.catalog().is_favorite(&t.id));
            }
            if let Some(category) = category {
                templates.retain(|t| t.category == category);
            }
            for template in &templates {
                print_template_line(service, template);
            }
            Ok(())
        }
        Commands::Show { id } => {
            let template = service.template(&id)?;
            println!("{}", serde_json::to_string_pretty(&template)?);
            Ok(())
        }
        Commands::Vars { template } => {
            let definitions = create_variable_definitions(&template);
            println!("{}", serde_json::to_string_pretty(&definitions)?);
            Ok(())
        }
        Commands::Render { id, values, adapt } => {
            let template = service.template(&id)?;
            let values = collect_values(&template, values);
            let rendered = service
                .render_full_template(&template, &values, adapt.options())
                .with_context(|| format!("Failed to render template `{id}`"))?;
            println!("{}", rendered.rendered_prompt);
            Ok(())
        }
        Commands::Chain {
            id,
            values,
            exec,
            adapt,
        } => {
            let template = service.template(&id)?;
            let values = collect_values(&template, values);
            let result = service
                .run_template_chain(&template, &values, exec.executor(), adapt.options())
                .await
                .with_context(|| format!("Failed to run chain `{id}`"))?;
            print_chain_result(&result)
        }
        Commands::SimpleChain {
            prompts,
            values,
            exec,
        } => {
            let steps = create_simple_chain(&prompts);
            let values: VariableContext = values.vars.into_iter().collect();
            let result = execute_chain(&steps, &values, &exec.executor()).await;
            print_chain_result(&result)
        }
        Commands::Adapt { text, adapt } => {
            let options = adapt.options().unwrap_or(config.adaptation);
            let adaptation = apply_context_adaptations(&text, &options);
            println!("{}", adaptation.prompt);
            println!();
            println!(
                "tokens: {}  savings: {}",
                adaptation.token_count, adaptation.savings
            );
            Ok(())
        }
        Commands::Suggest { name, limit } => {
            for value in service.suggestions(&name, limit) {
                println!("{value}");
            }
            Ok(())
        }
        Commands::Favorite { action } => match action {
            FavoriteAction::Add { id } => {
                service.template(&id)?;
                service.catalog().add_favorite(&id)?;
                println!("✔ Added {id} to favorites");
                Ok(())
            }
            FavoriteAction::Remove { id } => {
                service.catalog().remove_favorite(&id)?;
                println!("✔ Removed {id} from favorites");
                Ok(())
            }
        },
        Commands::Export { out } => {
            let data = service.export_user_data()?;
            let json = serde_json::to_string_pretty(&data)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✔ Exported user data to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let data: UserTemplateData =
                serde_json::from_str(&raw).context("Import file is not valid user data")?;
            service.import_user_data(data)?;
            println!("✔ Imported user data from {}", file.display());
            Ok(())
        }
        Commands::Enhance { prompt, exec } => {
            let prompts = PromptManager::discover(config.prompt_dirs.iter().cloned());
            let enhancer = Enhancer::new(&prompts, exec.executor());
            let enhanced = enhancer
                .enhance_prompt(&prompt)
                .await
                .context("Prompt enhancement failed")?;
            println!("{enhanced}");
            Ok(())
        }
        Commands::Questions { prompt, exec } => {
            let prompts = PromptManager::discover(config.prompt_dirs.iter().cloned());
            let enhancer = Enhancer::new(&prompts, exec.executor());
            let questions = enhancer
                .generate_refine_questions(&prompt)
                .await
                .context("Failed to generate questions")?;
            for (i, question) in questions.iter().enumerate() {
                println!("{}. {question}", i + 1);
            }
            Ok(())
        }
        Commands::Refine {
            prompt,
            answers,
            exec,
        } => {
            let prompts = PromptManager::discover(config.prompt_dirs.iter().cloned());
            let enhancer = Enhancer::new(&prompts, exec.executor());
            let enhanced = enhancer
                .enhance_with_context(&prompt, &answers)
                .await
                .context("Prompt refinement failed")?;
            println!("{enhanced}");
            Ok(())
        }
    }
}

/// Template defaults overlaid with `--var` values.
fn collect_values(template: &Template, values: ValueArgs) -> VariableContext {
    let mut context = template.default_values();
    context.extend(values.vars);
    context
}

fn print_template_line<S: KvStore, H: HistoryStore>(
    service: &TemplateService<S, H>,
    template: &Template,
) {
    let marker = if service.catalog().is_favorite(&template.id) {
        "★"
    } else {
        " "
    };
    let chain = if template.chain().is_some() {
        " (chain)"
    } else {
        ""
    };
    println!(
        "{marker} {:<32} {:<13} {}{chain}",
        template.id,
        template.category.to_string(),
        template.name
    );
}

fn print_chain_result(result: &ChainResult) -> Result<()> {
    for step in &result.steps {
        eprintln!("✔ {} → {}", step.step_name, step.output_variable);
    }
    if !result.success {
        anyhow::bail!(
            "Chain stopped after {} step(s): {}",
            result.steps.len(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", result.final_output);
    Ok(())
}
