use clap::Parser;
use clap::Subcommand;
use tally::Lexer;
use tally::evaluate;
use tally::lex::LexicalError;

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Tokenize { expression: String },
    Eval { expression: String },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { expression } => {
            for token in Lexer::new(&expression) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        if let Some(lexical_error) = e.downcast_ref::<LexicalError>() {
                            eprintln!(
                                "[line {}] Error: Unexpected character: {}",
                                lexical_error.line(),
                                lexical_error.token
                            );
                            eprintln!("{e:?}");

                            std::process::exit(65);
                        }
                        return Err(e);
                    }
                };
                println!("{token}");
            }
            println!("EOF  null");
        }
        Commands::Eval { expression } => match evaluate(&expression) {
            // three fractional digits, same as the calculator display
            Ok(value) => println!("{value:.3}"),
            Err(e) => {
                eprintln!("{e:?}");
                std::process::exit(65);
            }
        },
    }
    Ok(())
}
