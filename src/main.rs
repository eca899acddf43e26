fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = epub2txt::cli::Args::parse();
    epub2txt::cli::init_tracing(args.verbose);
    if let Err(e) = epub2txt::cli::run(&args) {
        if args.verbose {
            eprintln!("{}", e);
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        } else {
            eprintln!("{}", epub2txt::error_chain(&e));
        }
        std::process::exit(e.exit_code());
    }
}
