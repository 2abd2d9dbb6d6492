mod cell;
mod cli;
mod dedup;
mod error;
mod extraction;
mod flatfile;
mod fmt;
mod installments;
mod models;
mod pipeline;
mod resolver;
mod settings;
mod sheet;
mod store;
mod summary;

use clap::Parser;

use cli::{AccountsCommands, Cli, Commands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                institution,
                last_four,
                closing_day,
                due_day,
            } => cli::accounts::add(
                &name,
                &account_type,
                institution.as_deref(),
                last_four.as_deref(),
                closing_day,
                due_day,
            ),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Import {
            file,
            account,
            delimiter,
            no_header,
            yes,
        } => cli::import::run(&file, account.as_deref(), delimiter, no_header, yes),
        Commands::Summary {
            month,
            year,
            from_date,
            to_date,
        } => cli::report::run(month, year, from_date, to_date),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
