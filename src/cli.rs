// =============================================================================
// cli.rs — THE COMMAND LINE
// =============================================================================
//
//   masters_rankings_engine import -s Indoor -g M -y 2015-2019 -a 50-70 -e 60,200
//   masters_rankings_engine read   -y 2019 -a 50 -e 60 > rows.jsonl
//   masters_rankings_engine stats  --year 2015-2019 --season Indoor --event 60 --agegroup M50
//   masters_rankings_engine serve
// =============================================================================

use clap::{Args, Parser, Subcommand};

use crate::error::RangeSyntaxError;
use crate::models::{Gender, Season};
use crate::query_plan::QueryPlan;

#[derive(Parser, Debug)]
#[command(name = "masters_rankings_engine")]
#[command(about = "Masters athletics rankings importer and statistics service")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// SQLite database file (overrides RANKINGS_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch rankings pages and store every row
    Import(QueryArgs),
    /// Fetch and normalize rankings pages, printing records as JSON lines
    Read(QueryArgs),
    /// Print per-year quantiles for one slice of the database
    Stats(StatsArgs),
    /// Serve the stats query over HTTP
    Serve {
        /// Listen address (overrides RANKINGS_STATS_BIND)
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Which pages to fetch, plus run policy.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(short, long, value_enum, default_value = "Indoor")]
    pub season: Season,

    #[arg(short, long, value_enum, default_value = "M")]
    pub gender: Gender,

    /// "2018", "2015-2019" or "2014,2016"
    #[arg(short, long, default_value = "2018")]
    pub years: String,

    /// "50", "50-70" (five-year steps) or "50,60"
    #[arg(short = 'a', long, default_value = "50")]
    pub age_groups: String,

    /// Comma-separated event codes
    #[arg(short, long, default_value = "60")]
    pub events: String,

    /// Restrict to one country's rankings
    #[arg(short, long)]
    pub country: Option<String>,

    /// Log failed queries and carry on with the rest
    #[arg(long)]
    pub keep_going: bool,

    /// Skip the first N queries of the plan
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
}

impl QueryArgs {
    pub fn plan(&self) -> Result<QueryPlan, RangeSyntaxError> {
        QueryPlan::parse(
            self.season,
            self.gender,
            &self.years,
            &self.age_groups,
            &self.events,
            self.country.clone(),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// "2018" or "2015-2019"
    #[arg(long)]
    pub year: String,

    #[arg(long)]
    pub season: String,

    #[arg(long)]
    pub event: String,

    /// Gender-prefixed age group, e.g. M50
    #[arg(long)]
    pub agegroup: String,
}

impl StatsArgs {
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("year", self.year.as_str()),
            ("season", self.season.as_str()),
            ("event", self.event.as_str()),
            ("agegroup", self.agegroup.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_defaults() {
        let cli = Cli::try_parse_from(["masters_rankings_engine", "import"]).unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.season, Season::Indoor);
        assert_eq!(args.gender, Gender::M);
        assert_eq!(args.plan().unwrap().len(), 1);
        assert!(!args.keep_going);
    }

    #[test]
    fn test_import_flags() {
        let cli = Cli::try_parse_from([
            "masters_rankings_engine", "-d", "import", "-s", "Outdoor", "-g", "W",
            "-y", "2015-2019", "-a", "50-60", "-e", "100,200", "--keep-going", "--skip", "3",
        ])
        .unwrap();
        assert!(cli.debug);
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.season, Season::Outdoor);
        assert_eq!(args.plan().unwrap().len(), 5 * 3 * 2);
        assert_eq!(args.skip, 3);
    }

    #[test]
    fn test_bad_range_surfaces_from_plan() {
        let cli = Cli::try_parse_from(["masters_rankings_engine", "read", "-y", "2019-2015"]).unwrap();
        let Command::Read(args) = cli.command else {
            panic!("expected read");
        };
        assert!(args.plan().is_err());
    }
}
