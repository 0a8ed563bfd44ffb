use std::fmt::Write as _;

use anstyle::{AnsiColor, Color, Style};
use anyhow::Result;
use mini_recon::reconcile::{MatchedRecord, ReconcileConfig, ReconciliationResult};
use mini_recon::{CsvCodec, Record};

struct Palette {
    heading: Style,
    ok: Style,
    mismatch: Style,
    internal: Style,
    provider: Style,
}

impl Palette {
    fn colored() -> Self {
        let fg = |color| Style::new().fg_color(Some(Color::Ansi(color)));
        Palette {
            heading: Style::new().bold(),
            ok: fg(AnsiColor::Green),
            mismatch: fg(AnsiColor::Red),
            internal: fg(AnsiColor::Yellow),
            provider: fg(AnsiColor::Magenta),
        }
    }

    #[cfg(test)]
    fn plain() -> Self {
        Palette {
            heading: Style::new(),
            ok: Style::new(),
            mismatch: Style::new(),
            internal: Style::new(),
            provider: Style::new(),
        }
    }
}

pub fn show_diff(config: &ReconcileConfig, codec: &CsvCodec) -> Result<()> {
    let inputs = config.read(codec)?;
    let result = inputs.reconcile()?;

    print!("{}", format_diff(&result, &Palette::colored()));
    Ok(())
}

fn format_record(record: &Record) -> String {
    record
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_comparison(
    palette: &Palette,
    matched: bool,
    ours: Option<&str>,
    theirs: Option<&str>,
) -> String {
    let (style, sign) = if matched {
        (&palette.ok, "=")
    } else {
        (&palette.mismatch, "≠")
    };
    format!(
        "{style}{} {sign} {}{style:#}",
        ours.unwrap_or("-"),
        theirs.unwrap_or("-")
    )
}

fn format_matched(palette: &Palette, matched: &MatchedRecord) -> String {
    let record = &matched.record;
    format!(
        "{}  amount {}  status {}",
        record.reference().unwrap_or("-"),
        format_comparison(
            palette,
            matched.matched_amount,
            record.get(mini_recon::record::AMOUNT_FIELD),
            matched.provider_amount.as_deref()
        ),
        format_comparison(
            palette,
            matched.matched_status,
            record.get(mini_recon::record::STATUS_FIELD),
            matched.provider_status.as_deref()
        ),
    )
}

fn format_diff(result: &ReconciliationResult, palette: &Palette) -> String {
    let mut out = String::new();
    let heading = &palette.heading;

    if result.is_clean() {
        let ok = &palette.ok;
        let _ = writeln!(
            out,
            "{ok}✓ All transactions match!{ok:#} ({} matched)",
            result.matched.len()
        );
        return out;
    }

    let mismatched: Vec<_> = result
        .matched
        .iter()
        .filter(|matched| !matched.is_full_match())
        .collect();

    if !mismatched.is_empty() {
        let _ = writeln!(out, "{heading}━━━ Matched with differences ━━━{heading:#}");
        for matched in &mismatched {
            let _ = writeln!(out, "{}", format_matched(palette, matched));
        }
        let _ = writeln!(out);
    }

    let internal = &palette.internal;
    if !result.only_internal.is_empty() {
        let _ = writeln!(out, "{internal}━━━ Only in Internal ━━━{internal:#}");
        for record in &result.only_internal {
            let _ = writeln!(out, "{}", format_record(record));
        }
        let _ = writeln!(out);
    }

    let provider = &palette.provider;
    if !result.only_provider.is_empty() {
        let _ = writeln!(out, "{provider}━━━ Only in Provider ━━━{provider:#}");
        for record in &result.only_provider {
            let _ = writeln!(out, "{}", format_record(record));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{heading}━━━ Summary ━━━{heading:#}");
    let _ = writeln!(
        out,
        "  {} transaction(s) matched, {} with differences",
        result.matched.len(),
        mismatched.len()
    );
    let _ = writeln!(
        out,
        "  {internal}{}{internal:#} transaction(s) only in internal",
        result.only_internal.len()
    );
    let _ = writeln!(
        out,
        "  {provider}{}{provider:#} transaction(s) only in provider",
        result.only_provider.len()
    );

    out
}
