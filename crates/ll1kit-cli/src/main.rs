use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ll1kit::{
    left_factorize, parse, parse_strict, parse_table::ParseTable, FirstSets, FollowSets, Grammar,
    RuleLexer,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print FIRST/FOLLOW sets and the LL(1) parse table of a grammar.
    Analyze {
        /// The path of grammar definition file.
        grammar: PathBuf,

        /// Left-factorize the grammar before the analysis.
        #[arg(long)]
        left_factor: bool,
    },

    /// Parse an input string with the LL(1) parse table of a grammar.
    Parse {
        /// The path of grammar definition file.
        grammar: PathBuf,

        /// The path of the lexer rules, one `TOKEN REGEX' per line.
        #[arg(long)]
        lexer: PathBuf,

        /// Left-factorize the grammar before building the table.
        #[arg(long)]
        left_factor: bool,

        /// Reject input left over after the start symbol.
        #[arg(long)]
        strict: bool,

        /// The input text.
        input: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    match args.command {
        Command::Analyze {
            grammar,
            left_factor,
        } => analyze(load_grammar(&grammar, left_factor)?),
        Command::Parse {
            grammar,
            lexer,
            left_factor,
            strict,
            input,
        } => {
            let grammar = load_grammar(&grammar, left_factor)?;
            let rules = fs::read_to_string(&lexer)
                .with_context(|| format!("failed to read lexer rules from {}", lexer.display()))?;
            let lexer = RuleLexer::from_str(&rules).context("invalid lexer rules")?;
            run_parse(grammar, lexer, &input, strict)
        }
    }
}

fn load_grammar(path: &Path, left_factor: bool) -> anyhow::Result<Grammar> {
    let mut grammar = Grammar::from_file(path)
        .with_context(|| format!("failed to load the grammar from {}", path.display()))?;
    if left_factor && left_factorize(&mut grammar) {
        tracing::debug!("the grammar has been left-factorized");
    }
    Ok(grammar)
}

fn build_table(grammar: &Grammar) -> (FirstSets, FollowSets, ParseTable<ll1kit::Alternative>) {
    let firsts = FirstSets::compute(grammar);
    let follows = FollowSets::compute(grammar, &firsts);
    let table = ParseTable::build(grammar, &firsts, &follows);
    (firsts, follows, table)
}

fn report_conflicts(grammar: &Grammar, table: &ParseTable<ll1kit::Alternative>) {
    for conflict in table.conflicts() {
        println!("[warning] {}", conflict.display(grammar));
    }
}

fn analyze(grammar: Grammar) -> anyhow::Result<()> {
    let (firsts, follows, table) = build_table(&grammar);

    println!("{}", grammar);
    println!("## first sets:");
    let nonterminals: Vec<_> = grammar.nonterminals().collect();
    print!(
        "{}",
        firsts.display(grammar.symbols(), nonterminals.iter().copied())
    );
    println!("\n## follow sets:");
    print!("{}", follows.display(grammar.symbols()));
    println!("\n## parse table:");
    print!("{}", table.display(&grammar));

    report_conflicts(&grammar, &table);
    if !table.is_ll1() {
        let n = table.conflicts().len();
        let suffix = if n == 1 { "" } else { "s" };
        println!(
            "[warning] The grammar is not LL(1): {} conflicting cell{}.",
            n, suffix
        );
    }

    Ok(())
}

fn run_parse(
    grammar: Grammar,
    mut lexer: RuleLexer,
    input: &str,
    strict: bool,
) -> anyhow::Result<()> {
    let (_, _, table) = build_table(&grammar);
    report_conflicts(&grammar, &table);

    let result = if strict {
        parse_strict(input, &table, &grammar, &mut lexer)
    } else {
        parse(input, &table, &grammar, &mut lexer)
    };
    for line in &result.log {
        println!("{}", line);
    }
    println!();
    print!("{}", result.tree);

    if let Some(failure) = &result.failure {
        println!(
            "\nexpected: {}",
            result.expected.display(grammar.symbols())
        );
        anyhow::bail!(
            "parse failed at `{}' ({:?})",
            failure.lookahead,
            failure.kind
        );
    }

    Ok(())
}
