//! Command line driver: compiles `.msg`/`.srv` files into Python modules.
//!
//! Exit codes: 0 on success, 1 for schema errors, 2 for generation errors,
//! 3 for unexpected errors.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::debug;

use rospygen::{
    ensure_outdir, includepath_to_dict, write_modules, Error, Generator, MessageGenerator,
    MsgContext, ServiceGenerator, EXT_MSG, EXT_SRV,
};

#[derive(Parser)]
#[command(
    name = "rospygen",
    version,
    about = "Compile ROS message and service definitions into Python modules"
)]
struct Args {
    /// Write the package __init__.py marker instead of generating code
    #[arg(long)]
    initpy: bool,

    /// Package the input files belong to
    #[arg(short, required_unless_present = "initpy")]
    package: Option<String>,

    /// Package source directory (accepted for compatibility)
    #[arg(short)]
    srcdir: Option<PathBuf>,

    /// Output directory
    #[arg(short)]
    outdir: PathBuf,

    /// Dependency search path entry, repeatable
    #[arg(short = 'I', value_name = "NS:PATH")]
    include: Vec<String>,

    /// Input .msg/.srv files
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    process::exit(run(Args::parse()));
}

fn report(err: &Error) -> i32 {
    match err {
        Error::InvalidMsgSpec(_) | Error::UnknownType(_) | Error::Generation(_) => {
            eprintln!("ERROR: {}", err);
        }
        // diagnostic detail only for the unexpected class
        Error::Io(_) => eprintln!("ERROR: {:?}", err),
    }
    err.exit_code()
}

fn run(args: Args) -> i32 {
    debug!("srcdir: {:?}", args.srcdir);

    if args.initpy {
        return match write_modules(&args.outdir) {
            Ok(()) => 0,
            Err(err) => report(&err),
        };
    }

    let package = args.package.unwrap_or_default();
    if args.files.is_empty() {
        eprintln!("ERROR: please specify input files");
        return 2;
    }
    if let Err(err) = ensure_outdir(&args.outdir) {
        return report(&err);
    }
    let search_path = match includepath_to_dict(&args.include) {
        Ok(search_path) => search_path,
        Err(err) => return report(&err),
    };

    let mut context = MsgContext::create_default();
    let mut retcode = 0;
    for file in &args.files {
        let is_srv = file.extension().map_or(false, |ext| ext == "srv");
        let is_msg = file.extension().map_or(false, |ext| ext == "msg");
        let code = if is_msg {
            MessageGenerator.generate_messages(
                &mut context,
                &package,
                std::slice::from_ref(file),
                &args.outdir,
                &search_path,
            )
        } else if is_srv {
            ServiceGenerator.generate_messages(
                &mut context,
                &package,
                std::slice::from_ref(file),
                &args.outdir,
                &search_path,
            )
        } else {
            eprintln!(
                "ERROR: unknown input extension (expected {} or {}): {}",
                EXT_MSG,
                EXT_SRV,
                file.display()
            );
            2
        };
        retcode = retcode.max(code);
    }
    retcode
}
