//! 対話式フォーム
//!
//! 各項目を順に表示し、入力された値で票根を編集する。

use crate::controller::FormController;
use crate::error::{CineStubError, Result};
use cinestub_common::{resolve_template, TicketField, TEMPLATES};
use dialoguer::{Input, Select};
use std::path::PathBuf;

/// 1項目に対する操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAction {
    /// 現在の値のまま
    Keep,
    /// 空にする
    Clear,
    /// 値を置き換える
    Set(String),
    /// ここで終了
    Quit,
}

/// 入力文字列を操作に変換
///
/// 空入力は維持、`-` は消去、`q` は終了。それ以外は入力そのまま。
pub fn parse_field_input(input: &str) -> FieldAction {
    match input.trim() {
        "" => FieldAction::Keep,
        "-" => FieldAction::Clear,
        "q" | "Q" => FieldAction::Quit,
        _ => FieldAction::Set(input.to_string()),
    }
}

/// 対話式で票根を編集
pub fn run_interactive_form(controller: &mut FormController) -> Result<()> {
    println!("操作: [Enter]不变 [-]清空 [q]结束");
    println!("---\n");

    for (idx, field) in TicketField::ALL.into_iter().enumerate() {
        let current = controller.data().get(field).to_string();
        println!("[{}/{}] {} ({})", idx + 1, TicketField::ALL.len(), field.label(), field.key());
        if !current.is_empty() {
            println!("  当前: {}", current);
        }

        match prompt_field(field)? {
            FieldAction::Keep => {}
            FieldAction::Clear => {
                controller.edit_field(field, "");
                println!("  → 已清空\n");
            }
            FieldAction::Set(value) => {
                println!("  → {}\n", value);
                controller.edit_field(field, value);
            }
            FieldAction::Quit => {
                println!("结束编辑");
                return Ok(());
            }
        }
    }

    select_template(controller)?;
    prompt_poster(controller)?;
    Ok(())
}

fn prompt_field(field: TicketField) -> Result<FieldAction> {
    let input: String = Input::new()
        .with_prompt(field.label())
        .allow_empty(true)
        .interact_text()
        .map_err(|e| CineStubError::Prompt(e.to_string()))?;
    Ok(parse_field_input(&input))
}

fn select_template(controller: &mut FormController) -> Result<()> {
    let current = resolve_template(&controller.data().template_id);
    let default_idx = TEMPLATES.iter().position(|t| t.id == current.id).unwrap_or(0);
    let items: Vec<String> = TEMPLATES
        .iter()
        .map(|t| format!("{} ({})", t.name, t.id))
        .collect();

    let selected = Select::new()
        .with_prompt("模板")
        .items(&items)
        .default(default_idx)
        .interact()
        .map_err(|e| CineStubError::Prompt(e.to_string()))?;

    controller.select_template(TEMPLATES[selected].id);
    Ok(())
}

fn prompt_poster(controller: &mut FormController) -> Result<()> {
    let input: String = Input::new()
        .with_prompt("海报图片路径 ([Enter]不变 [-]移除)")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| CineStubError::Prompt(e.to_string()))?;

    match parse_field_input(&input) {
        FieldAction::Keep | FieldAction::Quit => {}
        FieldAction::Clear => {
            controller.clear_poster();
            println!("  → 已移除海报");
        }
        FieldAction::Set(path) => {
            let path = PathBuf::from(path.trim());
            if !path.exists() {
                return Err(CineStubError::FileNotFound(path.display().to_string()));
            }
            controller.upload_poster(std::fs::read(&path)?)?;
            println!("  → 已上传 {}", path.display());
        }
    }
    Ok(())
}
