//! Tracing subscriber setup: console formatter and initialisation.
use std::io::IsTerminal as _;

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Render one event as a tagged console line.
///
/// The `[INFO]`, `[WARN]` and `[ERROR]` tags are part of the CLI contract:
/// scripts grep for them, so they are emitted even when colour is off.
fn render(level: tracing::Level, target: &str, msg: &str, ansi: bool) -> String {
    let (tag, color) = match level {
        tracing::Level::ERROR => ("[ERROR]", "\x1b[31m"),
        tracing::Level::WARN => ("[WARN]", "\x1b[33m"),
        tracing::Level::INFO => ("[INFO]", "\x1b[32m"),
        _ => ("[DEBUG]", "\x1b[2m"),
    };
    let body = if target == "volt::stage" {
        format!("==> {msg}")
    } else {
        msg.to_string()
    };
    if ansi {
        format!("{color}{tag}\x1b[0m {body}")
    } else {
        format!("{tag} {body}")
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] that emits volt-style tagged lines.
struct VoltFormatter {
    ansi: bool,
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for VoltFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        writeln!(
            writer,
            "{}",
            render(*metadata.level(), metadata.target(), &extractor.message, self.ansi)
        )
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr; info and debug go to stdout. `verbose`
/// lowers the default level to `debug`. `VOLT_LOG` (an [`EnvFilter`]
/// directive such as `volt_cli=trace`) overrides both.
///
/// Must be called once at program startup, before any logging.
///
/// [`EnvFilter`]: tracing_subscriber::EnvFilter
pub fn init_subscriber(verbose: bool) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("VOLT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(VoltFormatter {
            ansi: std::io::stdout().is_terminal(),
        })
        .with_writer(make_writer)
        .with_filter(filter);

    tracing_subscriber::registry().with(console_layer).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tags() {
        assert_eq!(
            render(tracing::Level::INFO, "volt_cli::build", "Completed", false),
            "[INFO] Completed"
        );
        assert_eq!(
            render(tracing::Level::WARN, "volt_cli::build", "careful", false),
            "[WARN] careful"
        );
        assert_eq!(
            render(tracing::Level::ERROR, "volt_cli::build", "broken", false),
            "[ERROR] broken"
        );
        assert_eq!(
            render(tracing::Level::DEBUG, "volt_cli::build", "noise", false),
            "[DEBUG] noise"
        );
    }

    #[test]
    fn stage_gets_arrow() {
        assert_eq!(
            render(tracing::Level::INFO, "volt::stage", "Installing", false),
            "[INFO] ==> Installing"
        );
    }

    #[test]
    fn ansi_keeps_tag_text() {
        let line = render(tracing::Level::ERROR, "x", "bad", true);
        assert!(line.contains("[ERROR]"));
        assert!(line.ends_with(" bad"));
    }
}
