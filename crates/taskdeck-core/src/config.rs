use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::query::SortOrder;
use crate::task::Priority;

pub const RC_ENV_VAR: &str =
  "TASKDECKRC";
const RC_FILE_NAME: &str =
  ".taskdeckrc";
const DEFAULT_DATA_DIR: &str =
  "~/.taskdeck";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("data.location", DEFAULT_DATA_DIR),
      ("default.priority", "low"),
      ("confirm", "on"),
      ("color", "on"),
      ("timezone", "local"),
      ("sort", "desc")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid boolean for \
             {key}: {v}"
          )
        })
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn default_priority(
    &self
  ) -> anyhow::Result<Priority> {
    match self.get("default.priority") {
      | Some(raw) => {
        raw
          .parse::<Priority>()
          .context(
            "invalid default.priority"
          )
      }
      | None => Ok(Priority::Low)
    }
  }

  pub fn confirm_enabled(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("confirm")?
        .unwrap_or(true)
    )
  }

  pub fn color_enabled(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("color")?
        .unwrap_or(true)
    )
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortOrder> {
    let raw = self
      .get("sort")
      .unwrap_or_else(|| {
        "desc".to_string()
      });
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "asc" | "ascending" => {
        Ok(SortOrder {
          ascending: true
        })
      }
      | "desc" | "descending" => {
        Ok(SortOrder {
          ascending: false
        })
      }
      | other => {
        Err(anyhow!(
          "invalid sort setting: \
           {other} (expected asc or \
           desc)"
        ))
      }
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = match raw_line
        .split_once('#')
      {
        | Some((before, _)) => {
          before.trim()
        }
        | None => raw_line.trim()
      };

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle; skipping");
          continue;
        }
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }

  match cfg.get("data.location") {
    | Some(value)
      if !value.trim().is_empty() =>
    {
      Ok(expand_tilde(Path::new(
        value.trim()
      )))
    }
    | _ => {
      let home = dirs::home_dir()
        .ok_or_else(|| {
          anyhow!(
            "cannot determine home \
             directory"
          )
        })?;
      Ok(home.join(".taskdeck"))
    }
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    resolve_data_dir
  };
  use crate::task::Priority;

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::default();
    assert_eq!(
      cfg
        .default_priority()
        .expect("priority"),
      Priority::Low
    );
    assert!(
      cfg
        .confirm_enabled()
        .expect("confirm")
    );
    assert!(
      !cfg
        .default_sort()
        .expect("sort")
        .ascending
    );
  }

  #[test]
  fn reads_rc_file_with_includes_and_comments()
  {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "confirm = off\n"
    )
    .expect("write include");

    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# taskdeck settings\n\
       default.priority = high  # \
       trailing\n\
       include extra.rc\n\
       \n\
       sort = asc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg
        .default_priority()
        .expect("priority"),
      Priority::High
    );
    assert!(
      !cfg
        .confirm_enabled()
        .expect("confirm")
    );
    assert!(
      cfg
        .default_sort()
        .expect("sort")
        .ascending
    );
  }

  #[test]
  fn overrides_win_and_strip_rc_prefix()
  {
    let temp = tempdir().expect("tempdir");
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "rc.data.location".to_string(),
        temp
          .path()
          .display()
          .to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      )
    ]);

    assert_eq!(
      resolve_data_dir(&cfg, None)
        .expect("data dir"),
      temp.path()
    );
    assert!(
      !cfg.color_enabled().expect("color")
    );
  }

  #[test]
  fn malformed_values_are_errors() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "not a setting\n")
      .expect("write rc");
    assert!(
      Config::load(Some(&rc)).is_err()
    );

    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "confirm".to_string(),
      "maybe".to_string()
    )]);
    assert!(
      cfg.confirm_enabled().is_err()
    );
  }
}
