//! glslx compiler CLI

use clap::Parser as ClapParser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glslx::config::CONFIG_FILE_NAME;
use glslx::{
    codegen, parse, prune_unreachable, Config, Diagnostics, FileIncludes, GlslxError, Preprocessor, Stage,
    TranslationUnit, VERSION,
};

#[derive(ClapParser, Debug)]
#[command(name = "glslx")]
#[command(version = VERSION)]
#[command(about = "GLSL to HLSL shader compiler", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Translate a GLSL shader to HLSL
    Compile {
        input: PathBuf,

        /// Shader stage; inferred from the file extension when omitted
        #[arg(short, long)]
        stage: Option<Stage>,

        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file, defaults to glslx.toml next to the input
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit compiler-injected hidden globals
        #[arg(long)]
        write_hidden: bool,

        /// Skip the texture/image/ray-query helper preamble
        #[arg(long)]
        no_helpers: bool,

        /// Keep functions, globals and structures unreachable from main
        #[arg(long)]
        noprune: bool,

        /// Write the preprocessed source to this file
        #[arg(short = 'p', long)]
        preprocessed: Option<PathBuf>,

        #[command(flatten)]
        preprocessor: PreprocessorArgs,
    },

    /// Parse a shader and print a summary
    Check {
        input: PathBuf,

        /// Shader stage; inferred from the file extension when omitted
        #[arg(short, long)]
        stage: Option<Stage>,

        #[command(flatten)]
        preprocessor: PreprocessorArgs,
    },
}

#[derive(clap::Args, Debug)]
struct PreprocessorArgs {
    /// Predefine a macro, NAME or NAME=VALUE
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Extra directory searched by #include
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,
}

impl PreprocessorArgs {
    fn apply(&self, config: &mut Config) {
        config.preprocessor.defines.extend(self.defines.iter().cloned());
        config.preprocessor.include_dirs.extend(self.include_dirs.iter().cloned());
    }
}

fn resolve_stage(input: &Path, stage: Option<Stage>) -> Option<Stage> {
    stage.or_else(|| {
        input
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Stage::from_extension)
    })
}

fn read_and_parse(
    input: &Path,
    stage: Option<Stage>,
    config: &Config,
    preprocessed: Option<&PathBuf>,
) -> Option<TranslationUnit> {
    let Some(stage) = resolve_stage(input, stage) else {
        eprintln!(
            "error: cannot infer the shader stage of {}, pass --stage",
            input.display()
        );
        return None;
    };
    let source = match fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: failed to read {}: {}", input.display(), e);
            return None;
        }
    };
    let filename = input.display().to_string();

    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let includes = FileIncludes::new(base, config.preprocessor.include_dirs.clone());
    let mut preprocessor = Preprocessor::new().with_includes(&includes);
    for define in &config.preprocessor.defines {
        if let Err(e) = preprocessor.define_str(define) {
            eprintln!("error: {}", e.message());
            return None;
        }
    }
    let text = match preprocessor.process(&source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{}", Diagnostics::new(&source, &filename).format_with_context(&e));
            return None;
        }
    };
    if let Some(path) = preprocessed {
        if let Err(e) = fs::write(path, &text) {
            eprintln!("error: failed to write {}: {}", path.display(), e);
            return None;
        }
    }
    log::debug!("parsing {} as a {} shader", input.display(), stage);

    match parse(&text, stage) {
        Ok(tu) => Some(tu),
        Err(e) => {
            eprintln!("{}", Diagnostics::new(&text, &filename).format_with_context(&e));
            None
        }
    }
}

fn load_config(input: &Path, explicit: Option<&PathBuf>) -> Result<Config, GlslxError> {
    match explicit {
        Some(path) => Config::load(path),
        None => {
            let dir = input.parent().unwrap_or_else(|| Path::new("."));
            Config::load(&dir.join(CONFIG_FILE_NAME))
        }
    }
}

/// Flags of the compile subcommand that override the config file
struct CompileOverrides<'a> {
    write_hidden: bool,
    no_helpers: bool,
    noprune: bool,
    preprocessor: &'a PreprocessorArgs,
}

fn run_compile(
    input: &Path,
    stage: Option<Stage>,
    output: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    preprocessed: Option<&PathBuf>,
    overrides: CompileOverrides,
) -> bool {
    let mut config = match load_config(input, config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.message());
            return false;
        }
    };
    if overrides.write_hidden {
        config.writer.write_hidden = true;
    }
    if overrides.no_helpers {
        config.writer.emit_helpers = false;
    }
    if overrides.noprune {
        config.prune = false;
    }
    overrides.preprocessor.apply(&mut config);

    let Some(mut tu) = read_and_parse(input, stage, &config, preprocessed) else {
        return false;
    };
    if config.prune {
        prune_unreachable(&mut tu);
    }
    let hlsl = codegen::generate_hlsl(&tu, &config.writer);

    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, &hlsl) {
                eprintln!("error: failed to write {}: {}", path.display(), e);
                return false;
            }
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", hlsl),
    }
    true
}

fn run_check(input: &Path, stage: Option<Stage>, preprocessor: &PreprocessorArgs) -> bool {
    let mut config = match load_config(input, None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.message());
            return false;
        }
    };
    preprocessor.apply(&mut config);
    let Some(tu) = read_and_parse(input, stage, &config, None) else {
        return false;
    };
    let user_functions = tu.user_functions().count();
    let visible_globals = tu.globals.iter().filter(|&&g| !tu.var(g).flags.hidden).count();
    println!("{}: ok ({} stage)", input.display(), tu.stage());
    println!("  globals:          {}", visible_globals);
    println!("  structures:       {}", tu.structures.len());
    println!("  interface blocks: {}", tu.interface_blocks.len());
    println!("  functions:        {}", user_functions);
    true
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let ok = match &args.command {
        Commands::Compile {
            input,
            stage,
            output,
            config,
            write_hidden,
            no_helpers,
            noprune,
            preprocessed,
            preprocessor,
        } => run_compile(
            input,
            *stage,
            output.as_ref(),
            config.as_ref(),
            preprocessed.as_ref(),
            CompileOverrides {
                write_hidden: *write_hidden,
                no_helpers: *no_helpers,
                noprune: *noprune,
                preprocessor,
            },
        ),
        Commands::Check {
            input,
            stage,
            preprocessor,
        } => run_check(input, *stage, preprocessor),
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
