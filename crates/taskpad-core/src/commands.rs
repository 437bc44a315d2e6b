use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::classifier::classify;
use crate::cli::Invocation;
use crate::config::{
  Config,
  parse_bool
};
use crate::datastore::Slot;
use crate::datetime::{
  local_date,
  parse_due_date
};
use crate::gate::SuggestionGate;
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::task::{
  Priority,
  TaskInput
};
use crate::view::{
  PriorityFilter,
  SortKey,
  SortOrder,
  StatusFilter,
  ViewQuery,
  derive_view
};

pub fn known_command_names()
-> Vec<&'static str> {
  vec![
    "add", "edit", "done", "delete",
    "info", "list", "suggest", "stats",
    "help", "version",
  ]
}

pub fn expand_command_abbrev<'a>(
  token: &'a str,
  known: &[&'a str]
) -> Option<&'a str> {
  if known.contains(&token) {
    return Some(token);
  }

  let mut matches =
    known.iter().copied().filter(
      |name| name.starts_with(token)
    );
  let first = matches.next()?;
  if matches.next().is_some() {
    None
  } else {
    Some(first)
  }
}

#[instrument(skip(
  store, cfg, renderer, inv
))]
pub fn dispatch<S: Slot>(
  store: &mut TaskStore<S>,
  cfg: &Config,
  renderer: &Renderer,
  inv: Invocation
) -> anyhow::Result<()> {
  let now = Utc::now();
  let command = inv.command.as_str();
  let args = &inv.command_args;

  debug!(
    command,
    args = ?args,
    "dispatching command"
  );

  let result = match command {
    | "add" => {
      cmd_add(store, renderer, args, now)
    }
    | "edit" => {
      cmd_edit(store, renderer, args, now)
    }
    | "done" => cmd_done(store, args, now),
    | "delete" => cmd_delete(store, args),
    | "info" => {
      cmd_info(store, renderer, args)
    }
    | "list" => {
      cmd_list(
        store, cfg, renderer, args, now
      )
    }
    | "suggest" => {
      cmd_suggest(renderer, args)
    }
    | "stats" => {
      renderer.print_stats(&store.stats())
    }
    | "help" => cmd_help(),
    | "version" => {
      println!(
        "{}",
        env!("CARGO_PKG_VERSION")
      );
      Ok(())
    }
    | other => {
      Err(anyhow!(
        "unknown command: {other}"
      ))
    }
  };

  if let Some(err) =
    store.take_write_error()
  {
    eprintln!(
      "warning: {err}; changes will \
       not survive this session"
    );
  }

  result
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
  Description(String),
  Priority(Priority),
  Due(Option<NaiveDate>),
  Suggest(bool)
}

/// Splits words into title text and
/// `key:value` modifiers. Everything
/// after `--` is title text.
#[instrument(skip(args, today))]
fn parse_title_and_mods(
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<(String, Vec<Mod>)>
{
  let mut title_parts = Vec::new();
  let mut mods = Vec::new();

  let mut literal = false;
  for arg in args {
    if arg == "--" && !literal {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, today)?
    {
      mods.push(one_mod);
      continue;
    }

    title_parts.push(arg.clone());
  }

  Ok((title_parts.join(" "), mods))
}

fn parse_one_mod(
  tok: &str,
  today: NaiveDate
) -> anyhow::Result<Option<Mod>> {
  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();

  match key.as_str() {
    | "desc" | "description" => {
      Ok(Some(Mod::Description(
        value.to_string()
      )))
    }
    | "pri" | "priority" => {
      Ok(Some(Mod::Priority(
        value.parse()?
      )))
    }
    | "due" => {
      if value.trim().is_empty() {
        Ok(Some(Mod::Due(None)))
      } else {
        Ok(Some(Mod::Due(Some(
          parse_due_date(value, today)?
        ))))
      }
    }
    | "suggest" => {
      Ok(Some(Mod::Suggest(parse_bool(
        value
      ))))
    }
    | _ => Ok(None)
  }
}

/// Applies modifiers; returns whether
/// the priority was set explicitly and
/// whether a suggestion was requested.
fn apply_mods(
  input: &mut TaskInput,
  mods: &[Mod]
) -> (bool, bool) {
  let mut explicit_priority = false;
  let mut suggest = false;
  for one_mod in mods {
    match one_mod {
      | Mod::Description(text) => {
        input.description = text.clone();
      }
      | Mod::Priority(priority) => {
        input.priority = *priority;
        explicit_priority = true;
      }
      | Mod::Due(date) => {
        input.due_date = *date;
      }
      | Mod::Suggest(flag) => {
        suggest = *flag;
      }
    }
  }
  (explicit_priority, suggest)
}

#[instrument(skip(
  store, renderer, args, now
))]
fn cmd_add<S: Slot>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  args: &[String],
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command add");

  let today =
    local_date(now, renderer.timezone());
  let (title, mods) =
    parse_title_and_mods(args, today)?;
  let mut input = TaskInput::new(title);
  let (explicit_priority, suggest) =
    apply_mods(&mut input, &mods);

  // Single synchronous draft: the ticket
  // is still current when it is checked.
  let mut gate = SuggestionGate::new();
  let ticket = gate.begin();
  let suggestion = if suggest {
    let mut suggestion = classify(
      &input.title,
      &input.description
    );
    if explicit_priority {
      suggestion.priority =
        input.priority;
    } else {
      input.priority =
        suggestion.priority;
    }
    Some(suggestion)
  } else {
    None
  };

  let mut task = store.add(input, now)?;
  if let Some(suggestion) = suggestion
    && let Some(accepted) =
      gate.accept(ticket, suggestion)
  {
    task = store.apply_suggestion(
      &task.id, &accepted
    )?;
  }
  gate.reset();

  println!(
    "Created task {} ({}).",
    task.short_id(),
    task.priority
  );
  Ok(())
}

#[instrument(skip(
  store, renderer, args, now
))]
fn cmd_edit<S: Slot>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  args: &[String],
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command edit");

  let (target, rest) =
    split_target(args, "edit")?;
  let current =
    store.resolve(target)?.clone();

  let today =
    local_date(now, renderer.timezone());
  let (title, mods) =
    parse_title_and_mods(rest, today)?;

  let mut input =
    TaskInput::new(if title.is_empty() {
      current.title.clone()
    } else {
      title
    })
    .with_description(
      current.description.clone()
    )
    .with_priority(current.priority)
    .with_due_date(current.due_date);
  let (_, suggest) =
    apply_mods(&mut input, &mods);
  if suggest {
    warn!(
      "suggest: only applies to add; \
       ignored"
    );
  }

  let task =
    store.edit(&current.id, input)?;
  println!(
    "Modified task {}.",
    task.short_id()
  );
  Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_done<S: Slot>(
  store: &mut TaskStore<S>,
  args: &[String],
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command done");

  let (target, _) =
    split_target(args, "done")?;
  let id = store.resolve(target)?.id.clone();
  let task =
    store.toggle_complete(&id, now)?;

  if task.is_completed() {
    println!(
      "Completed task {}.",
      task.short_id()
    );
  } else {
    println!(
      "Reopened task {}.",
      task.short_id()
    );
  }
  Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete<S: Slot>(
  store: &mut TaskStore<S>,
  args: &[String]
) -> anyhow::Result<()> {
  info!("command delete");

  let (target, _) =
    split_target(args, "delete")?;
  let id = store.resolve(target)?.id.clone();
  let task = store.remove(&id)?;

  println!(
    "Deleted task {} '{}'.",
    task.short_id(),
    task.title
  );
  Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_info<S: Slot>(
  store: &TaskStore<S>,
  renderer: &Renderer,
  args: &[String]
) -> anyhow::Result<()> {
  info!("command info");

  let (target, _) =
    split_target(args, "info")?;
  let task = store.resolve(target)?;
  renderer.print_task_info(task)
}

#[instrument(skip(
  store, cfg, renderer, args, now
))]
fn cmd_list<S: Slot>(
  store: &TaskStore<S>,
  cfg: &Config,
  renderer: &Renderer,
  args: &[String],
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command list");

  let query =
    parse_view_args(args, cfg.default_view()?)?;
  let rows =
    derive_view(store.list(), &query);

  renderer.print_stats(&store.stats())?;
  renderer.print_task_table(
    &rows,
    local_date(now, renderer.timezone())
  )
}

#[instrument(skip(renderer, args))]
fn cmd_suggest(
  renderer: &Renderer,
  args: &[String]
) -> anyhow::Result<()> {
  info!("command suggest");

  let mut title_parts = Vec::new();
  let mut description = String::new();
  for arg in args {
    if let Some(text) = arg
      .strip_prefix("desc:")
      .or_else(|| {
        arg.strip_prefix("description:")
      })
    {
      description = text.to_string();
    } else {
      title_parts.push(arg.as_str());
    }
  }

  let suggestion = classify(
    &title_parts.join(" "),
    &description
  );
  renderer.print_suggestion(&suggestion)
}

fn cmd_help() -> anyhow::Result<()> {
  println!(
    "Commands:
  add <title..> [desc:TEXT] [priority:low|medium|high] [due:DATE] [suggest:yes]
  edit <id> [title..] [desc:TEXT] [priority:P] [due:DATE|due:]
  done <id>        toggle completion
  delete <id>
  info <id>
  list [text..] [status:all|pending|completed] [priority:all|low|medium|high]
       [sort:created|priority|title|dueDate] [order:asc|desc]
  suggest <title..> [desc:TEXT]
  stats
  version

Ids may be shortened to any unique prefix. DATE accepts YYYY-MM-DD,
today, tomorrow, yesterday, weekday names, +Nd and +Nw."
  );
  Ok(())
}

/// Builds the list query on top of the
/// configured defaults. Bare words are
/// search text.
fn parse_view_args(
  args: &[String],
  base: ViewQuery
) -> anyhow::Result<ViewQuery> {
  let mut query = base;
  let mut search = Vec::new();

  for arg in args {
    let Some((key, value)) =
      arg.split_once(':')
    else {
      search.push(arg.as_str());
      continue;
    };

    match key.to_ascii_lowercase().as_str()
    {
      | "search" => search.push(value),
      | "status" => {
        query = query.with_status(
          value.parse::<StatusFilter>()?
        );
      }
      | "pri" | "priority" => {
        query = query.with_priority(
          value
            .parse::<PriorityFilter>()?
        );
      }
      | "sort" => {
        query = query.with_sort(
          value.parse::<SortKey>()?
        );
      }
      | "order" => {
        query = query.with_order(
          value.parse::<SortOrder>()?
        );
      }
      | _ => search.push(arg.as_str())
    }
  }

  Ok(query.with_search(search.join(" ")))
}

fn split_target<'a>(
  args: &'a [String],
  command: &str
) -> anyhow::Result<(&'a str, &'a [String])>
{
  match args.split_first() {
    | Some((first, rest)) => {
      Ok((first.as_str(), rest))
    }
    | None => {
      Err(anyhow!(
        "{command} requires a task id"
      ))
    }
  }
}
