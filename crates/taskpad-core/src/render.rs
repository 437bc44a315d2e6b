use std::io::{
  self,
  IsTerminal,
  Write
};

use anyhow::anyhow;
use chrono::NaiveDate;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::classifier::ClassifierSuggestion;
use crate::config::Config;
use crate::datetime::format_timestamp;
use crate::task::{
  Priority,
  Task
};
use crate::view::Stats;

#[derive(Debug, Clone)]
pub struct Renderer {
  color: bool,
  tz:    Tz
}

impl Renderer {
  pub fn new(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let color_cfg = cfg
      .get("color")
      .unwrap_or_else(|| "on".to_string());
    let color = match color_cfg
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        io::stdout().is_terminal()
      }
      | "off" | "no" | "false" | "0" => {
        false
      }
      | other => {
        return Err(anyhow!(
          "invalid color setting: \
           {other}"
        ));
      }
    };

    Ok(Self {
      color,
      tz: cfg.timezone()
    })
  }

  pub fn plain(tz: Tz) -> Self {
    Self {
      color: false,
      tz
    }
  }

  pub fn timezone(&self) -> &Tz {
    &self.tz
  }

  pub fn print_task_table(
    &self,
    tasks: &[Task],
    today: NaiveDate
  ) -> anyhow::Result<()> {
    self.write_task_table(
      io::stdout().lock(),
      tasks,
      today
    )
  }

  #[tracing::instrument(skip(self, out, tasks, today), fields(count = tasks.len()))]
  pub fn write_task_table<W: Write>(
    &self,
    mut out: W,
    tasks: &[Task],
    today: NaiveDate
  ) -> anyhow::Result<()> {
    if tasks.is_empty() {
      writeln!(out, "No tasks.")?;
      return Ok(());
    }

    let headers = vec![
      "ID".to_string(),
      "Done".to_string(),
      "Pri".to_string(),
      "Due".to_string(),
      "Title".to_string(),
      "Category".to_string(),
    ];

    let mut rows =
      Vec::with_capacity(tasks.len());

    for task in tasks {
      let id =
        self.paint(task.short_id(), "33");
      let done = if task.is_completed() {
        "[x]"
      } else {
        "[ ]"
      }
      .to_string();

      let priority = match task.priority {
        | Priority::High => {
          self.paint("high", "31")
        }
        | Priority::Medium => {
          "medium".to_string()
        }
        | Priority::Low => {
          self.paint("low", "2")
        }
      };

      let due = match task.due_date {
        | Some(date)
          if date < today
            && !task.is_completed() =>
        {
          self.paint(
            &date.to_string(),
            "31"
          )
        }
        | Some(date) => date.to_string(),
        | None => String::new()
      };

      rows.push(vec![
        id,
        done,
        priority,
        due,
        task.title.clone(),
        task
          .category
          .clone()
          .unwrap_or_default(),
      ]);
    }

    write_table(&mut out, headers, rows)?;
    Ok(())
  }

  pub fn print_task_info(
    &self,
    task: &Task
  ) -> anyhow::Result<()> {
    self.write_task_info(
      io::stdout().lock(),
      task
    )
  }

  #[tracing::instrument(skip(self, out, task), fields(id = %task.id))]
  pub fn write_task_info<W: Write>(
    &self,
    mut out: W,
    task: &Task
  ) -> anyhow::Result<()> {
    writeln!(out, "id          {}", task.id)?;
    writeln!(out, "title       {}", task.title)?;
    if !task.description.is_empty() {
      writeln!(
        out,
        "description {}",
        task.description
      )?;
    }
    writeln!(out, "status      {}", task.status)?;
    writeln!(out, "priority    {}", task.priority)?;
    writeln!(
      out,
      "created     {}",
      format_timestamp(
        task.created_at,
        &self.tz
      )
    )?;
    if let Some(completed_at) =
      task.completed_at
    {
      writeln!(
        out,
        "completed   {}",
        format_timestamp(
          completed_at,
          &self.tz
        )
      )?;
    }
    if let Some(due) = task.due_date {
      writeln!(out, "due         {due}")?;
    }
    if let Some(category) =
      &task.category
    {
      writeln!(out, "category    {category}")?;
    }
    if let Some(urgency) = &task.urgency
    {
      writeln!(out, "urgency     {urgency}")?;
    }

    Ok(())
  }

  pub fn print_suggestion(
    &self,
    suggestion: &ClassifierSuggestion
  ) -> anyhow::Result<()> {
    self.write_suggestion(
      io::stdout().lock(),
      suggestion
    )
  }

  pub fn write_suggestion<W: Write>(
    &self,
    mut out: W,
    suggestion: &ClassifierSuggestion
  ) -> anyhow::Result<()> {
    writeln!(
      out,
      "priority  {}",
      suggestion.priority
    )?;
    writeln!(
      out,
      "category  {}",
      suggestion.category
    )?;
    writeln!(
      out,
      "urgency   {}",
      suggestion.urgency
    )?;
    if let Some(reasoning) =
      &suggestion.reasoning
    {
      writeln!(out, "reason    {reasoning}")?;
    }
    Ok(())
  }

  pub fn print_stats(
    &self,
    stats: &Stats
  ) -> anyhow::Result<()> {
    self.write_stats(
      io::stdout().lock(),
      stats
    )
  }

  pub fn write_stats<W: Write>(
    &self,
    mut out: W,
    stats: &Stats
  ) -> anyhow::Result<()> {
    writeln!(
      out,
      "{} • {} completed • {} pending • \
       {} high priority",
      plural(stats.total, "task"),
      stats.completed,
      stats.pending,
      stats.high_priority
    )?;
    Ok(())
  }

  fn paint(
    &self,
    text: &str,
    code: &str
  ) -> String {
    if !self.color {
      return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
  }
}

fn plural(
  count: usize,
  noun: &str
) -> String {
  if count == 1 {
    format!("{count} {noun}")
  } else {
    format!("{count} {noun}s")
  }
}

fn write_table<W: Write>(
  mut writer: W,
  headers: Vec<String>,
  rows: Vec<Vec<String>>
) -> anyhow::Result<()> {
  let column_count = headers.len();
  let mut widths =
    vec![0usize; column_count];

  for (idx, header) in
    headers.iter().enumerate()
  {
    widths[idx] = widths[idx].max(
      UnicodeWidthStr::width(
        header.as_str()
      )
    );
  }

  for row in &rows {
    for (idx, cell) in
      row.iter().enumerate()
    {
      widths[idx] = widths[idx].max(
        UnicodeWidthStr::width(
          strip_ansi(cell).as_str()
        )
      );
    }
  }

  let last = column_count
    .saturating_sub(1);
  for (idx, header) in
    headers.iter().enumerate()
  {
    write_cell(
      &mut writer,
      header,
      widths[idx],
      idx == last
    )?;
  }
  writeln!(writer)?;

  for (idx, width) in
    widths.iter().enumerate()
  {
    write!(
      writer,
      "{:-<width$}",
      "",
      width = *width
    )?;
    if idx != last {
      write!(writer, " ")?;
    }
  }
  writeln!(writer)?;

  for row in rows {
    for (idx, cell) in
      row.iter().enumerate()
    {
      write_cell(
        &mut writer,
        cell,
        widths[idx],
        idx == last
      )?;
    }
    writeln!(writer)?;
  }

  Ok(())
}

fn write_cell<W: Write>(
  writer: &mut W,
  cell: &str,
  width: usize,
  last: bool
) -> anyhow::Result<()> {
  if last {
    write!(writer, "{cell}")?;
    return Ok(());
  }
  let visible_width =
    UnicodeWidthStr::width(
      strip_ansi(cell).as_str()
    );
  let padding =
    width.saturating_sub(visible_width);
  write!(
    writer,
    "{}{} ",
    cell,
    " ".repeat(padding)
  )?;
  Ok(())
}

fn strip_ansi(s: &str) -> String {
  let mut out =
    String::with_capacity(s.len());
  let mut escaped = false;

  for ch in s.chars() {
    if escaped {
      if ch == 'm' {
        escaped = false;
      }
      continue;
    }

    if ch == '\x1b' {
      escaped = true;
      continue;
    }

    out.push(ch);
  }

  out
}
