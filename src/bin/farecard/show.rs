use farecard::card::Card;
use farecard::transit::{self, Subscription, TransitInfo, Trip};
use farecard::Error;
use owo_colors::OwoColorize;
use pad::{Alignment, PadStr};
use tracing::{debug, trace_span, warn};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Prints what we know about a card: what it is, and if we know the system, its
/// balance, trips and subscriptions.
pub fn show(card: &Card) {
    let span = trace_span!("show", tag_id = %card.tag_id());
    let _enter = span.enter();

    println!(
        "┏╸{}╺ {}, scanned {}",
        card.card_type().italic(),
        card.tag_id(),
        card.scanned_at().format(DATE_FORMAT)
    );
    match transit::parse(card) {
        Ok(info) => show_info(&info),
        Err(Error::UnsupportedCard) => {
            debug!("No transit system claims this card");
            println!("┗╸{}", "unsupported card".red());
        }
        Err(err) => {
            warn!(%err, "Couldn't decode card");
            println!("┗╸{} {}", "error:".red(), err);
        }
    }
}

fn show_info(info: &TransitInfo) {
    println!(
        "┠─╴{} {}",
        info.card_name.bold(),
        info.serial_number.as_deref().unwrap_or("(no serial)")
    );
    println!("┠─╴Balance: {}", info.balance.green());

    let mut sections = Vec::new();
    if !info.subscriptions.is_empty() {
        sections.push(("Subscriptions", render_subscriptions(&info.subscriptions)));
    }
    if !info.trips.is_empty() {
        sections.push(("Trips", render_trips(&info.trips)));
    }
    if sections.is_empty() {
        println!("┗─╴{}", "no trips".italic());
        return;
    }

    let last_section = sections.len() - 1;
    for (i, (title, lines)) in sections.iter().enumerate() {
        let (head, rail) = if i == last_section {
            ("┗┳╴", " ")
        } else {
            ("┠┬╴", "┃")
        };
        println!("{}{}", head, title.italic());
        let last_line = lines.len().saturating_sub(1);
        for (j, line) in lines.iter().enumerate() {
            let branch = if j == last_line { "┗─╴" } else { "┠─╴" };
            println!("{}{}{}", rail, branch, line);
        }
    }
}

fn render_trips(trips: &[Trip]) -> Vec<String> {
    trips
        .iter()
        .map(|trip| {
            let when = trip
                .timestamp
                .map(|t| t.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "????-??-?? ??:??".into());
            let what = [trip.agency.as_deref(), trip.route.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let mut line = format!(
                "{} {} {}",
                when,
                trip.mode.to_string().pad_to_width(15),
                what.pad_to_width(20)
            );
            match (&trip.start_station, &trip.end_station) {
                (Some(start), Some(end)) => line += &format!(" {} → {}", start, end),
                (Some(start), None) => line += &format!(" {}", start),
                _ => {}
            }
            if let Some(fare) = &trip.fare {
                line += &format!(
                    " {}",
                    fare.pad_to_width_with_alignment(12, Alignment::Right)
                );
            }
            line
        })
        .collect()
}

fn render_subscriptions(subscriptions: &[Subscription]) -> Vec<String> {
    subscriptions
        .iter()
        .map(|sub| {
            let span = |t: Option<chrono::NaiveDateTime>| {
                t.map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "?".into())
            };
            format!(
                "#{} {} ({}) {} to {}, {}",
                sub.id,
                sub.name.bold(),
                sub.agency,
                span(sub.valid_from),
                span(sub.valid_to),
                sub.activation.italic()
            )
        })
        .collect()
}
