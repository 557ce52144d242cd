use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "sahayak-connect",
    about = "Sahayak-Connect - Agentic outreach intelligence"
)]
pub struct CliArgs {
    /// Start with the main window hidden
    #[arg(long)]
    pub start_hidden: bool,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Prefill the command center with a target or topic
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = CliArgs::parse_from([
            "sahayak-connect",
            "--debug",
            "--query",
            "MeitY IndiaAI Mission",
        ]);
        assert!(args.debug);
        assert!(!args.start_hidden);
        assert_eq!(args.query.as_deref(), Some("MeitY IndiaAI Mission"));
    }

    #[test]
    fn defaults_to_nothing() {
        let args = CliArgs::parse_from(["sahayak-connect"]);
        assert!(!args.debug);
        assert_eq!(args.query, None);
    }
}
