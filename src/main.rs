use clap::{Arg, Command};
use log::LevelFilter;
use spamscope::config::DEFAULT_CONFIG_PATH;
use spamscope::explain::highlight;
use spamscope::training::load_corpus;
use spamscope::{AlertPolicy, AnalysisEngine, AnalysisHistory, AnalysisResult, Config, Trainer};
use std::io::Read;
use std::process;

fn cli() -> Command {
    Command::new("spamscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Explainable spam classification and URL phishing analysis for email text")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("Model artifact path (overrides model_path in the configuration)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("text")
                .long("text")
                .value_name("TEXT")
                .help("Analyze a single text")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .value_name("FILE")
                .help("Analyze the contents of a file ('-' reads stdin)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("preprocess")
                .long("preprocess")
                .value_name("TEXT")
                .help("Print the normalized form of a text")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_name("FILE")
                .help("Classify one text per line (URLs are also scored to raise alerts)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("train")
                .long("train")
                .value_name("CORPUS")
                .help("Train a model from a label<TAB>message corpus")
                .requires("output")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Where to write the trained model artifact")
                .action(clap::ArgAction::Set),
        )
}

fn main() {
    let matches = cli().get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    if let Some(corpus) = matches.get_one::<String>("train") {
        let output = matches.get_one::<String>("output").unwrap();
        if let Err(e) = train_model(corpus, output) {
            eprintln!("Training failed: {e:#}");
            process::exit(1);
        }
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };
    if let Some(model_path) = matches.get_one::<String>("model") {
        config.model_path = model_path.into();
    }

    if let Some(text) = matches.get_one::<String>("preprocess") {
        // normalization needs no model
        println!("{}", spamscope::TextNormalizer::new().preprocess(text));
        return;
    }

    let engine = match AnalysisEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error loading model: {e}");
            eprintln!(
                "Train one with: spamscope --train CORPUS --output {}",
                config.model_path.display()
            );
            process::exit(1);
        }
    };
    let json = matches.get_flag("json");

    if let Some(batch_path) = matches.get_one::<String>("batch") {
        if let Err(e) = run_batch(&engine, &config.alerts, batch_path, json) {
            eprintln!("Batch analysis failed: {e:#}");
            process::exit(1);
        }
        return;
    }

    let text = if let Some(text) = matches.get_one::<String>("text") {
        text.clone()
    } else if let Some(path) = matches.get_one::<String>("file") {
        match read_input(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error reading {path}: {e:#}");
                process::exit(1);
            }
        }
    } else {
        print_model_info(&engine);
        return;
    };

    let result = engine.analyze(&text);
    let alert = config.alerts.evaluate(&result);
    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                process::exit(1);
            }
        }
    } else {
        print_report(&text, &result);
        if let Some(kind) = alert {
            println!();
            println!("🚨 {}", config.alerts.message(kind, &result));
        }
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn train_model(corpus: &str, output: &str) -> anyhow::Result<()> {
    let samples = load_corpus(corpus)?;
    let report = Trainer::default().train(&samples)?;
    if let Some(parent) = std::path::Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    report.artifact.to_file(output)?;

    println!("Model written to: {output}");
    println!("  Vocabulary:      {}", report.artifact.vocabulary.len());
    println!(
        "  Train accuracy:  {:.2}% ({} samples)",
        report.metadata.train_accuracy * 100.0,
        report.metadata.train_samples
    );
    println!(
        "  Test accuracy:   {:.2}% ({} samples)",
        report.metadata.test_accuracy * 100.0,
        report.metadata.test_samples
    );
    Ok(())
}

fn read_input(path: &str) -> anyhow::Result<String> {
    let mut content = String::new();
    if path == "-" {
        std::io::stdin().read_to_string(&mut content)?;
    } else {
        content = std::fs::read_to_string(path)?;
    }
    Ok(content)
}

fn run_batch(
    engine: &AnalysisEngine,
    policy: &AlertPolicy,
    path: &str,
    json: bool,
) -> anyhow::Result<()> {
    let content = read_input(path)?;
    let mut history = AnalysisHistory::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let result = engine.analyze(line);
        let alert = policy.evaluate(&result);
        history.record(&result, alert);

        if json {
            println!("{}", serde_json::to_string(&result.classification)?);
        } else {
            let flag = alert.map(|kind| format!(" [{kind} alert]")).unwrap_or_default();
            println!(
                "{:<4} {:>6.2}%  {}{}",
                result.classification.label.as_str(),
                result.classification.confidence,
                truncate_string(line, 60),
                flag
            );
        }
    }

    let summary = history.summary();
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!();
        println!("📊 Batch summary");
        println!("  Total:   {}", summary.total);
        println!("  Spam:    {} ({:.1}%)", summary.spam, summary.spam_percentage);
        println!("  Ham:     {}", summary.ham);
        println!("  Alerts:  {}", summary.alerts);
    }
    Ok(())
}

fn print_report(text: &str, result: &AnalysisResult) {
    let classification = &result.classification;
    let verdict = if classification.is_spam() { "🚫 SPAM" } else { "✅ HAM" };
    println!("{verdict} ({:.2}% confidence)", classification.confidence);
    println!(
        "  P(spam) = {:.4}, P(ham) = {:.4}",
        classification.spam_probability, classification.ham_probability
    );
    println!();
    println!("{}", result.narrative);
    println!("{}", result.confidence_reasoning);

    if !result.top_features.is_empty() {
        println!();
        println!("Top features:");
        for feature in &result.top_features {
            println!(
                "  {:<20} contribution {:.4}  weight {:.4}",
                feature.word, feature.contribution, feature.weight
            );
        }
        println!();
        println!(
            "Highlighted: {}",
            truncate_string(&highlight(text, &result.suspicious_words, "[", "]"), 200)
        );
    }

    let phishing = &result.phishing;
    println!();
    println!(
        "🎣 Phishing risk: {} ({:.2}/100)",
        phishing.risk_level, phishing.score
    );
    println!("  {}", phishing.explanation);
    for finding in &phishing.suspicious_findings {
        println!("  {} (risk {})", finding.url, finding.risk_score);
        for reason in &finding.reasons {
            println!("    - {reason}");
        }
    }
}

fn print_model_info(engine: &AnalysisEngine) {
    let model = engine.model();
    println!("Model loaded: {} features, {:?} normalization", model.len(), model.norm());
    if let Some(metadata) = model.metadata() {
        println!(
            "  Train accuracy: {:.2}%, test accuracy: {:.2}%",
            metadata.train_accuracy * 100.0,
            metadata.test_accuracy * 100.0
        );
    }
    println!("Nothing to analyze. Use --text, --file or --batch (see --help).");
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_batch_help_mentions_url_scoring() {
        let command = cli();
        let batch = command
            .get_arguments()
            .find(|arg| arg.get_id() == "batch")
            .unwrap();
        let help = batch.get_help().unwrap().to_string();
        assert!(help.contains("URLs are also scored"), "{}", help);
    }

    #[test]
    fn test_train_requires_output() {
        assert!(cli()
            .try_get_matches_from(["spamscope", "--train", "corpus.tsv"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["spamscope", "--train", "corpus.tsv", "--output", "m.json"])
            .is_ok());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghij", 6), "abc...");
    }
}
