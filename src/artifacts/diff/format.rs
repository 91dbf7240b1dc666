//! Rendering of file deltas in the formats `diff` and `log -p` understand

use crate::artifacts::diff::file_delta::{ChangeKind, DiffOptions, FileDelta, OutputFormat};
use crate::artifacts::diff::diff_target::DiffTarget;
use crate::artifacts::diff::hunk::{HunkLine, NO_NEWLINE_MARKER, WhitespaceMode};
use colored::Colorize;
use std::io::Write;

/// Default total width of a `--stat` line
pub const STAT_WIDTH: usize = 80;

fn colorize() -> bool {
    colored::control::SHOULD_COLORIZE.should_colorize()
}

/// Print `deltas` in the format selected by `options`
pub fn print_deltas(
    writer: &mut dyn Write,
    deltas: &[FileDelta],
    options: &DiffOptions,
) -> anyhow::Result<()> {
    match options.format {
        OutputFormat::Patch => {
            for delta in deltas {
                print_patch(writer, delta, options)?;
            }
        }
        OutputFormat::Stat => print_stat(writer, deltas, options)?,
        OutputFormat::ShortStat => print_shortstat(writer, deltas, options)?,
        OutputFormat::NumStat => print_numstat(writer, deltas, options)?,
        OutputFormat::Summary => print_summary(writer, deltas)?,
        OutputFormat::NameOnly => {
            for delta in deltas {
                writeln!(writer, "{}", delta.path().display())?;
            }
        }
        OutputFormat::NameStatus => {
            for delta in deltas {
                match delta.kind {
                    ChangeKind::Renamed => writeln!(
                        writer,
                        "R{:03}\t{}\t{}",
                        delta.similarity.unwrap_or(100),
                        delta.old.file.display(),
                        delta.new.file.display()
                    )?,
                    kind => writeln!(writer, "{}\t{}", kind.letter(), delta.path().display())?,
                }
            }
        }
        OutputFormat::Raw => {
            for delta in deltas {
                print_raw(writer, delta, options)?;
            }
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn print_raw(
    writer: &mut dyn Write,
    delta: &FileDelta,
    options: &DiffOptions,
) -> anyhow::Result<()> {
    write!(
        writer,
        ":{} {} {} {} ",
        delta.old.raw_mode(),
        delta.new.raw_mode(),
        delta.old.oid.abbreviate(options.abbrev),
        delta.new.oid.abbreviate(options.abbrev),
    )?;

    match delta.kind {
        ChangeKind::Renamed => writeln!(
            writer,
            "R{:03}\t{}\t{}",
            delta.similarity.unwrap_or(100),
            delta.old.file.display(),
            delta.new.file.display()
        )?,
        kind => writeln!(writer, "{}\t{}", kind.letter(), delta.path().display())?,
    }

    Ok(())
}

fn meta_line(writer: &mut dyn Write, line: String) -> anyhow::Result<()> {
    writeln!(writer, "{}", line.bold())?;
    Ok(())
}

/// Unified patch of one delta; type changes print as a deletion followed by an addition
pub fn print_patch(
    writer: &mut dyn Write,
    delta: &FileDelta,
    options: &DiffOptions,
) -> anyhow::Result<()> {
    if delta.kind == ChangeKind::TypeChanged {
        let deleted = FileDelta {
            kind: ChangeKind::Deleted,
            old: delta.old.clone(),
            new: DiffTarget::from_nothing(&delta.old.file),
            similarity: None,
        };
        let added = FileDelta {
            kind: ChangeKind::Added,
            old: DiffTarget::from_nothing(&delta.new.file),
            new: delta.new.clone(),
            similarity: None,
        };
        print_patch(writer, &deleted, options)?;
        return print_patch(writer, &added, options);
    }

    if options.line.whitespace != WhitespaceMode::Exact && delta.has_no_visible_changes(options) {
        return Ok(());
    }

    let (a, b) = (&delta.old, &delta.new);
    meta_line(
        writer,
        format!("diff --git a/{} b/{}", a.file.display(), b.file.display()),
    )?;

    match (a.exists(), b.exists()) {
        (false, true) => meta_line(writer, format!("new file mode {}", b.pretty_mode()))?,
        (true, false) => meta_line(writer, format!("deleted file mode {}", a.pretty_mode()))?,
        _ if a.mode != b.mode => {
            meta_line(writer, format!("old mode {}", a.pretty_mode()))?;
            meta_line(writer, format!("new mode {}", b.pretty_mode()))?;
        }
        _ => {}
    }

    if delta.kind == ChangeKind::Renamed {
        meta_line(
            writer,
            format!("similarity index {}%", delta.similarity.unwrap_or(100)),
        )?;
        meta_line(writer, format!("rename from {}", a.file.display()))?;
        meta_line(writer, format!("rename to {}", b.file.display()))?;
    }

    if a.oid == b.oid {
        return Ok(());
    }

    let mut index_line = format!(
        "index {}..{}",
        a.oid.abbreviate(options.abbrev),
        b.oid.abbreviate(options.abbrev)
    );
    if a.mode == b.mode {
        index_line.push_str(&format!(" {}", a.pretty_mode()));
    }
    meta_line(writer, index_line)?;

    if delta.is_binary(options) {
        writeln!(
            writer,
            "Binary files {} and {} differ",
            a.diff_path("a/"),
            b.diff_path("b/")
        )?;
        return Ok(());
    }

    delta.with_hunks(options, |hunks| -> anyhow::Result<()> {
        let mut header_written = false;
        for hunk in hunks {
            if !header_written {
                meta_line(writer, format!("--- {}", a.diff_path("a/")))?;
                meta_line(writer, format!("+++ {}", b.diff_path("b/")))?;
                header_written = true;
            }

            writeln!(writer, "{}", hunk.header().cyan())?;
            for line in &hunk.lines {
                print_hunk_line(writer, line)?;
            }
        }
        Ok(())
    })
}

fn print_hunk_line(writer: &mut dyn Write, line: &HunkLine<'_>) -> anyhow::Result<()> {
    let text = line.text();
    let (body, terminated) = match text.strip_suffix(b"\n") {
        Some(body) => (body, true),
        None => (text, false),
    };

    if colorize() && !matches!(line, HunkLine::Context(_)) {
        let rendered = format!("{}{}", line.sigil(), String::from_utf8_lossy(body));
        match line {
            HunkLine::Delete(_) => write!(writer, "{}", rendered.red())?,
            _ => write!(writer, "{}", rendered.green())?,
        }
    } else {
        write!(writer, "{}", line.sigil())?;
        writer.write_all(body)?;
    }
    writeln!(writer)?;

    if !terminated {
        writeln!(writer, "{NO_NEWLINE_MARKER}")?;
    }

    Ok(())
}

/// Rename display with the common directory factored out: `dir/{a => b}/file`
pub fn rename_display(old: &str, new: &str) -> String {
    let a = old.as_bytes();
    let b = new.as_bytes();

    let mut prefix = 0;
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if x != y {
            break;
        }
        if *x == b'/' {
            prefix = i + 1;
        }
    }

    // the suffix must start with a slash and may not overlap the prefix
    let mut suffix = 0;
    let (mut i, mut j) = (a.len(), b.len());
    let floor = prefix.saturating_sub(usize::from(prefix > 0));
    while i > floor && j > floor && a[i - 1] == b[j - 1] {
        i -= 1;
        j -= 1;
        if a[i] == b'/' {
            suffix = a.len() - i;
        }
    }

    if prefix + suffix == 0 {
        return format!("{old} => {new}");
    }

    let a_mid = &old[prefix.min(old.len())..old.len().saturating_sub(suffix).max(prefix)];
    let b_mid = &new[prefix.min(new.len())..new.len().saturating_sub(suffix).max(prefix)];
    format!(
        "{}{{{} => {}}}{}",
        &old[..prefix],
        a_mid,
        b_mid,
        &old[old.len() - suffix..]
    )
}

fn stat_name(delta: &FileDelta) -> String {
    match delta.kind {
        ChangeKind::Renamed => rename_display(
            &delta.old.file.to_string_lossy(),
            &delta.new.file.to_string_lossy(),
        ),
        _ => delta.path().display().to_string(),
    }
}

struct StatRow {
    name: String,
    /// `None` for binary files
    changes: Option<(usize, usize)>,
    sizes: (usize, usize),
}

fn stat_rows(deltas: &[FileDelta], options: &DiffOptions) -> Vec<StatRow> {
    deltas
        .iter()
        .filter(|delta| {
            options.line.whitespace == WhitespaceMode::Exact
                || !delta.has_no_visible_changes(options)
        })
        .map(|delta| StatRow {
            name: stat_name(delta),
            changes: delta.line_stats(options),
            sizes: (delta.old.data.len(), delta.new.data.len()),
        })
        .collect()
}

fn scale(count: usize, max_change: usize, width: usize) -> usize {
    match count {
        0 => 0,
        _ => 1 + (count * width.saturating_sub(1)) / max_change.max(1),
    }
}

fn print_stat(
    writer: &mut dyn Write,
    deltas: &[FileDelta],
    options: &DiffOptions,
) -> anyhow::Result<()> {
    let rows = stat_rows(deltas, options);
    if rows.is_empty() {
        return Ok(());
    }

    let name_width = rows.iter().map(|row| row.name.chars().count()).max().unwrap_or(0);
    let max_change = rows
        .iter()
        .filter_map(|row| row.changes.map(|(added, deleted)| added + deleted))
        .max()
        .unwrap_or(0);
    let has_binary = rows.iter().any(|row| row.changes.is_none());
    let number_width = max_change.to_string().len().max(if has_binary { 3 } else { 0 });
    let graph_width = STAT_WIDTH.saturating_sub(name_width + number_width + 6).max(6);

    for row in &rows {
        match row.changes {
            None => writeln!(
                writer,
                " {:<name_width$} | {:>number_width$} {} -> {} bytes",
                row.name, "Bin", row.sizes.0, row.sizes.1
            )?,
            Some((added, deleted)) => {
                let (plus, minus) = match max_change > graph_width {
                    true => (
                        scale(added, max_change, graph_width),
                        scale(deleted, max_change, graph_width),
                    ),
                    false => (added, deleted),
                };
                let total = added + deleted;
                write!(writer, " {:<name_width$} | {:>number_width$}", row.name, total)?;
                if plus + minus > 0 {
                    write!(
                        writer,
                        " {}{}",
                        "+".repeat(plus).green(),
                        "-".repeat(minus).red()
                    )?;
                }
                writeln!(writer)?;
            }
        }
    }

    print_shortstat(writer, deltas, options)
}

/// ` N files changed, N insertions(+), N deletions(-)`
pub fn shortstat_line(files: usize, insertions: usize, deletions: usize) -> String {
    let plural = |n: usize, one: &str, many: &str| match n {
        1 => format!("{n} {one}"),
        _ => format!("{n} {many}"),
    };

    let mut line = format!(" {}", plural(files, "file changed", "files changed"));
    if insertions > 0 || deletions == 0 {
        line.push_str(&format!(", {}", plural(insertions, "insertion(+)", "insertions(+)")));
    }
    if deletions > 0 || insertions == 0 {
        line.push_str(&format!(", {}", plural(deletions, "deletion(-)", "deletions(-)")));
    }
    line
}

fn print_shortstat(
    writer: &mut dyn Write,
    deltas: &[FileDelta],
    options: &DiffOptions,
) -> anyhow::Result<()> {
    let rows = stat_rows(deltas, options);
    if rows.is_empty() {
        return Ok(());
    }

    let (insertions, deletions) = rows
        .iter()
        .filter_map(|row| row.changes)
        .fold((0, 0), |(i, d), (added, deleted)| (i + added, d + deleted));
    writeln!(writer, "{}", shortstat_line(rows.len(), insertions, deletions))?;

    Ok(())
}

fn print_numstat(
    writer: &mut dyn Write,
    deltas: &[FileDelta],
    options: &DiffOptions,
) -> anyhow::Result<()> {
    for row in stat_rows(deltas, options) {
        match row.changes {
            Some((added, deleted)) => writeln!(writer, "{added}\t{deleted}\t{}", row.name)?,
            None => writeln!(writer, "-\t-\t{}", row.name)?,
        }
    }

    Ok(())
}

fn print_summary(writer: &mut dyn Write, deltas: &[FileDelta]) -> anyhow::Result<()> {
    for delta in deltas {
        match delta.kind {
            ChangeKind::Added => writeln!(
                writer,
                " create mode {} {}",
                delta.new.pretty_mode(),
                delta.path().display()
            )?,
            ChangeKind::Deleted => writeln!(
                writer,
                " delete mode {} {}",
                delta.old.pretty_mode(),
                delta.path().display()
            )?,
            ChangeKind::Renamed => {
                writeln!(
                    writer,
                    " rename {} ({}%)",
                    stat_name(delta),
                    delta.similarity.unwrap_or(100)
                )?;
                if delta.mode_changed() {
                    writeln!(
                        writer,
                        " mode change {} => {} {}",
                        delta.old.pretty_mode(),
                        delta.new.pretty_mode(),
                        delta.new.file.display()
                    )?;
                }
            }
            ChangeKind::Modified | ChangeKind::TypeChanged if delta.mode_changed() => writeln!(
                writer,
                " mode change {} => {} {}",
                delta.old.pretty_mode(),
                delta.new.pretty_mode(),
                delta.path().display()
            )?,
            _ => {}
        }
    }

    Ok(())
}
