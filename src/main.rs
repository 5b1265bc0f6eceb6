use anyhow::{anyhow, Context};
use cinestub::analyzer::{GeminiAnalyzer, PosterAnalyzer};
use cinestub::cli::{parse_assignment, Cli, Commands, TicketInput};
use cinestub::config::Config;
use cinestub::controller::{ControllerConfig, FormController, MergePolicy};
use cinestub::export::{ExportController, RasterOptions, Rasterizer, ResvgRasterizer};
use cinestub::{interactive, logging};
use cinestub_common::{default_template, TicketData, TEMPLATES};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load().context("设置读取失败")?;

    match cli.command {
        Commands::Render { input, output, scale } => {
            println!("🎬 cinestub - 预览\n");

            let controller = build_form(&input)?;
            let svg = controller.render(scale).to_svg_document();

            let output = output.unwrap_or_else(|| PathBuf::from("ticket.svg"));
            std::fs::write(&output, svg)
                .with_context(|| format!("写入失败: {}", output.display()))?;
            println!("✔ 预览已保存: {}", output.display());
        }

        Commands::Export { input, output, scale, background, no_cors, no_taint } => {
            println!("🎬 cinestub - 生成图片\n");

            let controller = build_form(&input)?;
            let target = controller.render(1.0).capture_target();
            let options = RasterOptions {
                scale: scale.unwrap_or(config.export_scale),
                background_color: background,
                use_cors: !no_cors,
                allow_taint: !no_taint,
            };

            let rasterizer: Option<Arc<dyn Rasterizer>> = match ResvgRasterizer::new() {
                Ok(r) => Some(Arc::new(r)),
                Err(e) => {
                    tracing::error!(error = %e, "渲染器初始化失败");
                    None
                }
            };
            let mut exporter = ExportController::new(rasterizer);

            println!("- 正在生成...");
            if exporter.generate(&target, &options).await.is_none() {
                let notice = exporter.notice().unwrap_or_default().to_string();
                return Err(anyhow!(notice));
            }
            let image = exporter.last_image().context("没有生成结果")?;

            let output = output.unwrap_or_else(default_png_name);
            image
                .save(&output)
                .with_context(|| format!("写入失败: {}", output.display()))?;
            println!("✔ {}x{} 图片已保存: {}", image.width, image.height, output.display());
        }

        Commands::Fill { poster, data, set, output, preserve_edits } => {
            println!("✨ cinestub - 智能填充\n");

            let mut controller_config = config.controller_config();
            if preserve_edits {
                controller_config.merge_policy = MergePolicy::PreserveUserEdits;
            }
            if !controller_config.analysis_enabled {
                println!("⚠ 未设置API密钥，仅设置海报（`cinestub config --set-api-key`）");
            }

            let analyzer: Option<Arc<dyn PosterAnalyzer>> = if controller_config.analysis_enabled {
                Some(Arc::new(GeminiAnalyzer::from_config(&config)?))
            } else {
                None
            };

            let mut controller =
                FormController::with_data(controller_config, analyzer, load_ticket(data.as_deref())?);

            let bytes = read_poster(&poster)?;
            let outcome = controller.upload_poster(bytes)?;

            // 解析中の編集として扱う
            apply_assignments(&mut controller, &set)?;

            if outcome.analysis_started {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
                spinner.set_message(format!("AI 分析中... ({})", config.model));
                spinner.enable_steady_tick(Duration::from_millis(100));

                let applied = controller.next_analysis().await;
                spinner.finish_and_clear();

                if let Some(applied) = applied {
                    println!("✔ 分析完成，更新了 {} 项", applied.changed.len());
                    for field in &applied.changed {
                        println!("  {}: {}", field.label(), controller.data().get(*field));
                    }
                }
            }

            let output = output.unwrap_or_else(|| PathBuf::from("ticket.json"));
            save_ticket(controller.data(), &output)?;
            println!("\n✅ 已保存: {}", output.display());
        }

        Commands::Edit { input, output } => {
            println!("📝 cinestub - 编辑票根\n");

            let data = if input.exists() {
                load_ticket(Some(input.as_path()))?
            } else {
                TicketData::default()
            };
            let mut controller = FormController::with_data(ControllerConfig::default(), None, data);
            interactive::run_interactive_form(&mut controller)?;

            let output = output.unwrap_or(input);
            save_ticket(controller.data(), &output)?;
            println!("\n✔ 已保存: {}", output.display());
        }

        Commands::Templates => {
            println!("模板:");
            for template in TEMPLATES {
                let mark = if template.id == default_template().id { " (默认)" } else { "" };
                println!("  {:<8} {}  {}{}", template.id, template.name, template.preview_color, mark);
            }
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ 已设置API密钥");
            }

            if show {
                println!("设置:");
                println!("  文件: {}", Config::config_path()?.display());
                println!("  模型: {}", config.model);
                println!("  最大图片尺寸: {}px", config.max_image_size);
                match config.timeout_seconds {
                    Some(secs) => println!("  超时: {}秒", secs),
                    None => println!("  超时: 无"),
                }
                println!("  导出倍率: {}", config.export_scale);
                println!("  保留分析中的编辑: {}", config.preserve_user_edits);
                println!("  API密钥: {}", if config.has_api_key() { "已设置" } else { "未设置" });
            }
        }
    }

    Ok(())
}

fn default_png_name() -> PathBuf {
    PathBuf::from(chrono::Local::now().format("ticket-%Y%m%d-%H%M%S.png").to_string())
}

fn load_ticket(path: Option<&Path>) -> anyhow::Result<TicketData> {
    match path {
        Some(path) => TicketData::from_file(path)
            .with_context(|| format!("票根读取失败: {}", path.display())),
        None => Ok(TicketData::default()),
    }
}

fn save_ticket(data: &TicketData, path: &Path) -> anyhow::Result<()> {
    let json = data.to_json_pretty()?;
    std::fs::write(path, json).with_context(|| format!("写入失败: {}", path.display()))
}

fn read_poster(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("海报读取失败: {}", path.display()))
}

fn apply_assignments(controller: &mut FormController, assignments: &[String]) -> anyhow::Result<()> {
    for raw in assignments {
        let (key, value) =
            parse_assignment(raw).ok_or_else(|| anyhow!("格式应为 key=value: {}", raw))?;
        controller.edit_field_by_key(key, value)?;
    }
    Ok(())
}

/// render/export 用のフォームを組み立てる（解析なし）
fn build_form(input: &TicketInput) -> anyhow::Result<FormController> {
    let data = load_ticket(input.data.as_deref())?;
    let mut controller = FormController::with_data(ControllerConfig::default(), None, data);

    if let Some(template) = &input.template {
        controller.select_template(template.clone());
    }
    if input.no_poster {
        controller.clear_poster();
    }
    if let Some(poster) = &input.poster {
        controller.upload_poster(read_poster(poster)?)?;
    }
    apply_assignments(&mut controller, &input.set)?;

    Ok(controller)
}
