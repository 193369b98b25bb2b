#[path = "farecard/show.rs"]
mod show;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use chrono::Utc;
use clap::Parser as _;
use farecard::card::Card;
use farecard::classic::ClassicCard;
use pcsc::Context;
use tracing::{debug, trace, trace_span};

#[derive(clap::Parser, Debug)]
struct Args {
    /// Increase log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    quiet: u8,

    /// Use a specific reader (from list-readers).
    #[arg(short, long)]
    reader: Option<String>,

    /// Command.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Family {
    Desfire,
    Cepas,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Read the card on the reader.
    Read {
        #[arg(value_enum)]
        family: Family,
    },

    /// Decode a MIFARE Classic dump file.
    Dump { path: PathBuf },

    /// List connected readers.
    ListReaders,
}

impl Command {
    pub fn run(&self, args: &Args) -> Result<()> {
        match self {
            Self::Read { family } => self.read(args, *family),
            Self::Dump { path } => self.dump(path),
            Self::ListReaders => self.list_readers(args),
        }
    }

    fn read(&self, args: &Args, family: Family) -> Result<()> {
        let span = trace_span!("read", ?family);
        let _enter = span.enter();

        let ctx = Context::establish(pcsc::Scope::User)?;
        let mut card = select_card(&ctx, &args.reader)?;
        let tag_id = farecard::pcsc::get_uid(&mut card).context("Couldn't read tag ID")?;

        debug!("Reading card...");
        let card: Card = match family {
            Family::Desfire => farecard::desfire::read_card(&mut card, &tag_id)?.into(),
            Family::Cepas => farecard::cepas::read_card(&mut card, &tag_id)?.into(),
        };
        show::show(&card);
        Ok(())
    }

    fn dump(&self, path: &Path) -> Result<()> {
        let span = trace_span!("dump", ?path);
        let _enter = span.enter();

        let data =
            std::fs::read(path).with_context(|| format!("couldn't read {}", path.display()))?;
        // The UID is the first 4 bytes of the manufacturer block.
        let tag_id = data
            .get(..4)
            .ok_or(anyhow!("{} is too short to be a dump", path.display()))?;
        let mut card = ClassicCard::from_dump(tag_id, &data)?;
        card.scanned_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(Into::into)
            .unwrap_or_else(|_| Utc::now());
        show::show(&card.into());
        Ok(())
    }

    fn list_readers(&self, _args: &Args) -> Result<()> {
        let span = trace_span!("list_readers");
        let _enter = span.enter();

        let ctx = Context::establish(pcsc::Scope::User)?;
        let mut readers_buf = [0; 2048];
        for name in ctx.list_readers(&mut readers_buf)? {
            println!("{}", name.to_str()?);
        }
        Ok(())
    }
}

fn select_card(ctx: &Context, name_: &Option<String>) -> Result<pcsc::Card> {
    let span = trace_span!("select_card", name_);
    let _enter = span.enter();

    Ok(if let Some(name) = name_ {
        debug!(name, "Connecting to named reader");
        ctx.connect(
            std::ffi::CString::new(name.clone())?.as_c_str(),
            pcsc::ShareMode::Shared,
            pcsc::Protocols::ANY,
        )?
    } else {
        let mut readers_buf = [0; 2048];
        debug!("Listing available readers");
        let name = ctx
            .list_readers(&mut readers_buf)?
            .next()
            .ok_or(anyhow!("No supported reader connected"))?;

        debug!(?name, "Connecting to first available reader");
        ctx.connect(name, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)?
    })
}

fn init_logging(args: &Args) {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(match (2 + args.verbose).saturating_sub(args.quiet) {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::WARN,
            2 => tracing::Level::INFO,
            3 => tracing::Level::DEBUG,
            4.. => tracing::Level::TRACE,
        })
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    trace!(?args, "Starting up");
    args.command.run(&args)
}
