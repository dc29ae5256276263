// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `triage bind`, `triage unbind` and `triage bindings`.

use triage_agent::{BindingMap, ChannelBindings};
use triage_config::TriageConfig;
use triage_core::{ChannelId, TodoTarget, TriageError};

fn bindings(config: &TriageConfig) -> ChannelBindings {
    ChannelBindings::new(&config.bindings.path)
}

pub async fn run_bind(
    config: &TriageConfig,
    channel: &str,
    project_id: String,
    todolist_id: String,
) -> Result<(), TriageError> {
    let target = TodoTarget {
        project_id,
        todolist_id,
    };
    bindings(config)
        .set(&ChannelId(channel.to_string()), target.clone())
        .await?;
    println!(
        "{channel} -> project {} / to-do list {}",
        target.project_id, target.todolist_id
    );
    Ok(())
}

pub async fn run_unbind(config: &TriageConfig, channel: &str) -> Result<(), TriageError> {
    if bindings(config)
        .unset(&ChannelId(channel.to_string()))
        .await?
    {
        println!("{channel} unbound");
    } else {
        println!("{channel} had no binding");
    }
    Ok(())
}

pub async fn run_list(config: &TriageConfig) -> Result<(), TriageError> {
    let map = bindings(config).list().await?;
    print!("{}", render(&map));
    Ok(())
}

fn render(map: &BindingMap) -> String {
    if map.is_empty() {
        return "no channel bindings\n".to_string();
    }
    map.iter()
        .map(|(channel, target)| {
            format!(
                "{channel}\tproject {}\tto-do list {}\n",
                target.project_id, target.todolist_id
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> TriageConfig {
        let mut config = TriageConfig::default();
        config.bindings.path = dir
            .path()
            .join("bindings.json")
            .to_string_lossy()
            .into_owned();
        config
    }

    #[tokio::test]
    async fn bind_and_unbind_edit_the_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        run_bind(&config, "C1", "10".into(), "20".into()).await.unwrap();
        let map = bindings(&config).list().await.unwrap();
        assert_eq!(map["C1"].todolist_id, "20");

        run_unbind(&config, "C1").await.unwrap();
        assert!(bindings(&config).list().await.unwrap().is_empty());
    }

    #[test]
    fn renders_sorted_table() {
        let mut map = BindingMap::new();
        for (channel, project) in [("C2", "11"), ("C1", "10")] {
            map.insert(
                channel.to_string(),
                TodoTarget {
                    project_id: project.into(),
                    todolist_id: "20".into(),
                },
            );
        }
        assert_eq!(
            render(&map),
            "C1\tproject 10\tto-do list 20\nC2\tproject 11\tto-do list 20\n"
        );
        assert_eq!(render(&BindingMap::new()), "no channel bindings\n");
    }
}
