use crate::report::{
    run_check_course, run_scores, run_standings, CheckCourseArgs, ScoresArgs, StandingsArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use cohort_grader::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Cohort Grader",
    about = "Serve and inspect course scores and cohort standings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the final marks of an enrolled group
    Standings(StandingsArgs),
    /// Print one student's per-task scores as JSON
    Scores(ScoresArgs),
    /// Validate a course definition file and summarise its scoring groups
    CheckCourse(CheckCourseArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Standings(args) => run_standings(args),
        Command::Scores(args) => run_scores(args),
        Command::CheckCourse(args) => run_check_course(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn standings_flags_are_parsed() {
        let cli = Cli::try_parse_from(["cohort-grader", "standings", "hse-2024", "--retakes"])
            .expect("arguments parse");
        match cli.command {
            Some(Command::Standings(args)) => {
                assert_eq!(args.group, "hse-2024");
                assert!(args.retakes);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["cohort-grader"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
