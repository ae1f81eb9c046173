use clap::Parser;
use keymatch::cli::SubCommandExtend;
use keymatch::config::{Opts, SubCommand};

fn main() {
    env_logger::init();

    let opts = Opts::parse();
    let result = match &opts.subcmd {
        SubCommand::Match(cmd) => cmd.run(&opts),
        SubCommand::Show(cmd) => cmd.run(&opts),
    };

    if let Err(e) = result {
        eprintln!("[ERR] {:#}", e);
        std::process::exit(1);
    }
}
