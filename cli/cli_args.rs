use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Directory to bundle (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Path or name of the TOML config file (default: .xtools/xbundle/xbundle.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "disable_config_file",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Do not load any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub disable_config_file: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RuleOpts {
    #[arg(
        short = 'r',
        long = "rule",
        value_name = "NAME",
        action = clap::ArgAction::Append,
        help = "Activate an exclusion rule (repeatable).",
        help_heading = "Exclusion Rules"
    )]
    pub rules: Vec<String>,

    #[arg(
        long,
        help = "Activate every known rule.",
        help_heading = "Exclusion Rules"
    )]
    pub all_rules: bool,

    #[arg(
        long,
        help = "Ignore the rules activated in the config file.",
        help_heading = "Exclusion Rules"
    )]
    pub no_config_rules: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectionOpts {
    #[arg(
        long,
        value_name = "PATH",
        action = clap::ArgAction::Append,
        help = "Select only these paths; everything else starts deselected.",
        help_heading = "Selection"
    )]
    pub only: Vec<String>,

    #[arg(
        long,
        value_name = "PATH",
        action = clap::ArgAction::Append,
        help = "Check a file or directory. A checked file beats every rule.",
        help_heading = "Selection"
    )]
    pub select: Vec<String>,

    #[arg(
        long,
        value_name = "PATH",
        action = clap::ArgAction::Append,
        help = "Uncheck a file or directory.",
        help_heading = "Selection"
    )]
    pub deselect: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bundle the selected code files of a project into one prompt.",
    long_about = "xbundle browses a project as a tri-state selection tree, applies named exclusion \nrules, and concatenates the selected code files into a single text artifact \nsuitable for pasting into an AI model.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xbundle export -r \"Node Modules\" -r Markdown --save\n  xbundle tree --depth 3\n  xbundle explain --only src\n  xbundle rules enable \"Lock Files\"",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "e",
        visible_alias = "gen",
        about = "Concatenate the selected code files into one artifact."
    )]
    Export(ExportArgs),

    #[command(visible_alias = "t", about = "Show the selection tree.")]
    Tree(TreeArgs),

    #[command(
        visible_alias = "d",
        about = "Explain why each entry is or is not exported."
    )]
    Explain(ExplainArgs),

    #[command(visible_alias = "r", about = "List, enable or disable exclusion rules.")]
    Rules(RulesArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub rules: RuleOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,

    #[arg(
        long,
        value_name = "TEXT",
        help = "Text placed before the bundled files (overrides config).",
        help_heading = "Prompt"
    )]
    pub prefix: Option<String>,

    #[arg(
        long,
        value_name = "TEXT",
        help = "Text placed after the bundled files (overrides config).",
        help_heading = "Prompt"
    )]
    pub suffix: Option<String>,

    #[arg(
        long,
        value_name = "SIZE_STRING",
        help = "Skip files larger than this (e.g. '512KB', 'none'; overrides config).",
        help_heading = "Prompt"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long,
        help = "With --save, also write the artifact to standard output.",
        help_heading = "Output Control",
        requires = "save"
    )]
    pub stdout: bool,

    #[arg(
        short = 's', long, value_name = "SAVE_DIR",
        num_args = 0..=1,
        help_heading = "Output Control",
        help = "Save the artifact. Optional SAVE_DIR overrides config/default logic.",
    )]
    pub save: Option<Option<PathBuf>>,

    #[arg(
        long,
        help = "Report per-file and total token counts (cl100k_base) on stderr.",
        help_heading = "Output Control"
    )]
    pub count_tokens: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub rules: RuleOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,

    #[arg(
        long,
        value_name = "LEVELS",
        default_value_t = 2,
        help = "Load and open directories down to this many levels."
    )]
    pub depth: usize,

    #[arg(
        long,
        help = "Show everything an export would read instead of the browsed levels.",
        conflicts_with = "depth"
    )]
    pub complete: bool,

    #[arg(long, value_name = "TEXT", help = "Only show entries whose name contains TEXT.")]
    pub search: Option<String>,

    #[arg(short = 'f', long, value_name = "FORMAT", value_parser = ["text", "json"], default_value = "text")]
    pub format: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExplainArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub rules: RuleOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,

    #[arg(long, help = "Also list directories that are traversed.")]
    pub all: bool,

    #[arg(short = 'f', long, value_name = "FORMAT", value_parser = ["text", "json"], default_value = "text")]
    pub format: String,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[command(subcommand)]
    pub action: Option<RulesAction>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesAction {
    #[command(about = "List every known rule and whether it is active [default].")]
    List {
        #[arg(short = 'f', long, value_name = "FORMAT", value_parser = ["text", "json"], default_value = "text")]
        format: String,
    },
    #[command(about = "Activate a rule in the config file.")]
    Enable { name: String },
    #[command(about = "Deactivate a rule in the config file.")]
    Disable { name: String },
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}
