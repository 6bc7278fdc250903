use std::borrow::Cow;
use std::{fmt, thread};

use nu_ansi_term::{AnsiString, Color, Style};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::registry::LookupSpan;

/// One line per event: level, thread, the span path from the root, fields.
pub struct QueryFormatter;

impl<S, N> FormatEvent<S, N> for QueryFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();

        let span_path = ctx
            .event_scope()
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| span.name())
                    .collect::<Vec<_>>()
                    .join(":")
            })
            .unwrap_or_default();

        write!(
            &mut writer,
            "[{}]\t{} {}: ",
            level_paint(level),
            Style::new()
                .bold()
                .paint(thread::current().name().unwrap_or_default()),
            Color::Fixed(12).paint(span_path),
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn level_paint(level: Level) -> AnsiString<'static> {
    let color = match level {
        Level::ERROR => Color::Red,
        Level::WARN => Color::Yellow,
        Level::INFO => Color::Green,
        Level::DEBUG => Color::Blue,
        _ => Color::Purple,
    };
    color.paint(level.as_str())
}

/// Shorten query text for log lines, cutting on a char boundary.
pub fn query_preview(query: &str, max_chars: usize) -> Cow<'_, str> {
    match query.char_indices().nth(max_chars) {
        None => Cow::Borrowed(query),
        Some((cut, _)) => Cow::Owned(format!("{}...", &query[..cut])),
    }
}
