use clap::Args;
use happitrack::config::AppConfig;
use happitrack::error::AppError;
use happitrack::history::{write_csv, LogStore, SqliteHistoryStore, UserDirectory, UserId};
use happitrack::mood::{self, AnswerSet, MoodField};
use happitrack::notify::SmtpMailer;
use happitrack::MoodService;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Sleep quality (0-10)
    #[arg(long)]
    pub(crate) sleep: Option<String>,
    /// Exercise (0-5)
    #[arg(long)]
    pub(crate) exercise: Option<String>,
    /// Time with friends or family (0-5)
    #[arg(long)]
    pub(crate) connections: Option<String>,
    /// Gratitude practice (0-5)
    #[arg(long)]
    pub(crate) gratitude: Option<String>,
    /// Overall day rating (0-10)
    #[arg(long)]
    pub(crate) overall: Option<String>,
}

impl ScoreArgs {
    fn answers(&self) -> AnswerSet {
        AnswerSet::from_lookup(|key| {
            let value = match key {
                "sleep" => &self.sleep,
                "exercise" => &self.exercise,
                "connections" => &self.connections,
                "gratitude" => &self.gratitude,
                "overall" => &self.overall,
                _ => return None,
            };
            value.as_deref()
        })
    }
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// User whose history should be exported
    #[arg(long)]
    pub(crate) user_id: i64,
    /// Destination file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) fn run_score(args: ScoreArgs) {
    let answers = args.answers();
    let score = mood::score(&answers);

    println!("Happiness check-in");
    for field in MoodField::ALL {
        println!("  {:<42} {:>5.1}", field.prompt(), answers.get(field));
    }
    println!("\nScore: {score}/100");
    println!("Tip: {}", mood::tip(score));
}

pub(crate) async fn run_setup() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(SqliteHistoryStore::connect(&config.database.url).await?);
    let service = MoodService::new(
        Arc::clone(&store),
        Arc::new(SmtpMailer::new(config.mail.clone())),
    );

    let admin = service.seed_admin(&config.mail.admin_email).await?;
    println!(
        "Database ready at {}; admin account '{}' has id {}",
        config.database.url, admin.username, admin.id
    );
    store.close().await;
    Ok(())
}

pub(crate) async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = SqliteHistoryStore::connect(&config.database.url).await?;
    let user_id = UserId(args.user_id);

    if store.find_user(user_id).await?.is_none() {
        store.close().await;
        return Err(AppError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("user {user_id} does not exist"),
        )));
    }

    let entries = store.list(user_id).await?;
    store.close().await;

    match args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            write_csv(&entries, &mut writer)?;
            writer.flush()?;
            eprintln!("Exported {} entries to {}", entries.len(), path.display());
        }
        None => write_csv(&entries, io::stdout().lock())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_args_fall_back_for_missing_values() {
        let args = ScoreArgs {
            sleep: Some("10".to_string()),
            exercise: Some("five".to_string()),
            ..ScoreArgs::default()
        };
        let answers = args.answers();
        assert_eq!(answers.sleep, 10.0);
        assert_eq!(answers.exercise, 0.0);
        assert_eq!(mood::score(&answers).value(), 20.0);
    }
}
