use eframe::egui;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::board::{Direction, Placeholder};
use crate::config::{resolve_start, ViewerConfig};
use crate::file_ops::{self, Rotation};
use crate::pipeline::Thumbnailer;
use crate::{Result, ThumbviewError};

const SIDE_PANEL_MARGIN: f32 = 24.0;
const PLACEHOLDER_ASPECT: f32 = 0.75;

pub struct ViewerApp {
    pub config: ViewerConfig,
    pub thumbnailer: Thumbnailer,
    current: Option<PathBuf>,
    current_texture: Option<(PathBuf, egui::TextureHandle)>,
    thumbnails: HashMap<PathBuf, (u64, egui::TextureHandle)>,
    thumbnail_scale: f32,
    status: String,
}

fn load_texture(ctx: &egui::Context, path: &Path, name: String) -> Option<egui::TextureHandle> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Failed to load {}: {}", path.display(), e);
            return None;
        }
    };
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
    Some(ctx.load_texture(name, color_image, egui::TextureOptions::default()))
}

/// Largest size with the aspect ratio of `image` that fits inside `bounds`.
fn fit_within(image: egui::Vec2, bounds: egui::Vec2) -> egui::Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (bounds.x / image.x).min(bounds.y / image.y).min(1.0);
    image * scale
}

impl ViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: ViewerConfig, start: &Path) -> Result<Self> {
        let (folder, start_file) = resolve_start(start)?;
        let mut thumbnailer = Thumbnailer::new(&config)?;
        thumbnailer.open_folder(&folder)?;

        let current = start_file.or_else(|| thumbnailer.board().files().ok()?.into_iter().next());

        Ok(Self {
            config,
            thumbnailer,
            current,
            current_texture: None,
            thumbnails: HashMap::new(),
            thumbnail_scale: 1.0,
            status: String::new(),
        })
    }

    fn process_batch_results(&mut self, ctx: &egui::Context) {
        match self.thumbnailer.poll_batch() {
            None => {}
            Some(Ok(report)) if report.stale => {}
            Some(Ok(report)) => {
                self.status = match self.thumbnailer.board().len() {
                    Ok(count) => format!("{} images", count),
                    Err(e) => e.to_string(),
                };
                // The image on screen may have been pruned as unreadable
                let current_pruned = self
                    .current
                    .as_ref()
                    .map(|c| report.pruned.contains(c))
                    .unwrap_or(true);
                if current_pruned {
                    self.select(self.thumbnailer.board().files().ok().and_then(|f| f.into_iter().next()));
                }
            }
            Some(Err(e)) => self.fail(ctx, e),
        }
    }

    fn fail(&mut self, ctx: &egui::Context, e: ThumbviewError) {
        log::error!("{}", e);
        self.status = e.to_string();
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn select(&mut self, path: Option<PathBuf>) {
        if path != self.current {
            self.current = path;
            self.current_texture = None;
        }
    }

    fn step(&mut self, direction: Direction) {
        let Some(current) = self.current.clone() else {
            return;
        };
        match self.thumbnailer.board().neighbor(&current, direction) {
            Ok(next) => self.select(next),
            Err(e) => log::warn!("{}", e),
        }
    }

    fn rotate_current(&mut self, rotation: Rotation) {
        let Some(current) = self.current.clone() else {
            return;
        };
        match self.thumbnailer.rotate_file(&current, rotation) {
            Ok(()) => self.current_texture = None,
            Err(e) => {
                log::warn!("{}", e);
                self.status = e.to_string();
            }
        }
    }

    fn sort_current(&mut self, ctx: &egui::Context) {
        let (Some(current), Some(dest_dir)) = (self.current.clone(), self.config.sort_folder.clone()) else {
            return;
        };
        // Pick the successor while the file is still on the list
        let next = self
            .thumbnailer
            .board()
            .neighbor(&current, Direction::Next)
            .ok()
            .flatten()
            .filter(|next| next != &current)
            .or_else(|| self.thumbnailer.board().neighbor(&current, Direction::Previous).ok().flatten());

        match self.thumbnailer.move_file(&current, &dest_dir, self.config.copy_on_sort) {
            Ok(dest) if dest == current => {
                self.status = format!("Already in {}", dest_dir.display());
            }
            Ok(dest) if self.config.copy_on_sort => {
                self.status = format!("Copied to {}", dest.display());
            }
            Ok(dest) => {
                self.thumbnails.remove(&current);
                self.status = format!("Moved to {}", dest.display());
                self.select(next);
            }
            Err(e @ ThumbviewError::NoImagesLeft(_)) => self.fail(ctx, e),
            Err(e) => {
                log::warn!("{}", e);
                self.status = e.to_string();
            }
        }
    }

    fn rescale_thumbnails(&mut self, factor: f32) {
        self.thumbnail_scale *= factor;
        if let Err(e) = self.thumbnailer.board().scale_thumbnails(self.thumbnail_scale) {
            log::warn!("{}", e);
        }
    }

    fn show_info(&mut self) {
        if let Some(current) = &self.current {
            self.status = match file_ops::describe(current) {
                Ok(details) => details.to_string(),
                Err(e) => e.to_string(),
            };
        }
    }

    fn thumbnail_texture(&mut self, ctx: &egui::Context, placeholder: &Placeholder) -> Option<egui::TextureId> {
        let thumbnail = placeholder.thumbnail.as_ref()?;
        let fresh = self
            .thumbnails
            .get(&placeholder.source)
            .map(|(revision, _)| *revision == placeholder.revision)
            .unwrap_or(false);
        // Rotation bumps the revision, so the texture is reloaded then
        if !fresh {
            let name = format!("thumbnail_{}", placeholder.source.display());
            let texture = load_texture(ctx, thumbnail, name)?;
            self.thumbnails
                .insert(placeholder.source.clone(), (placeholder.revision, texture));
        }
        self.thumbnails.get(&placeholder.source).map(|(_, t)| t.id())
    }

    fn show_toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("◀ Previous").clicked() {
                self.step(Direction::Previous);
            }
            if ui.button("Next ▶").clicked() {
                self.step(Direction::Next);
            }
            ui.separator();
            if ui.button("⟲ Left").clicked() {
                self.rotate_current(Rotation::CounterClockwise);
            }
            if ui.button("⟳ Right").clicked() {
                self.rotate_current(Rotation::Clockwise);
            }
            ui.separator();
            if ui.button("−").clicked() {
                self.rescale_thumbnails(self.config.scale_step);
            }
            if ui.button("+").clicked() {
                self.rescale_thumbnails(1.0 / self.config.scale_step);
            }
            ui.separator();
            if ui.button("Info").clicked() {
                self.show_info();
            }
            if self.config.sort_folder.is_some() && ui.button("Sort").clicked() {
                self.sort_current(ctx);
            }
            ui.label(&self.status);
        });
    }

    fn show_thumbnails(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let placeholders = match self.thumbnailer.board().snapshot() {
            Ok(placeholders) => placeholders,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };
        let width = self
            .thumbnailer
            .board()
            .thumbnail_width()
            .unwrap_or(self.config.thumbnail_width) as f32;

        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for placeholder in &placeholders {
                let name = placeholder
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let texture = self.thumbnail_texture(ctx, placeholder);
                match (texture, placeholder.display_size) {
                    (Some(texture_id), Some([w, h])) => {
                        let selected = self.current.as_ref() == Some(&placeholder.source);
                        let button = egui::ImageButton::new((texture_id, egui::vec2(w, h))).selected(selected);
                        let response = ui.add(button);
                        if response.clicked() {
                            clicked = Some(placeholder.source.clone());
                        }
                        response.on_hover_text(&name);
                    }
                    _ => {
                        let (rect, response) = ui.allocate_exact_size(
                            egui::vec2(width, width * PLACEHOLDER_ASPECT),
                            egui::Sense::hover(),
                        );
                        ui.painter().rect_filled(
                            rect,
                            egui::Rounding::same(5.0),
                            egui::Color32::LIGHT_GRAY,
                        );
                        ui.painter().text(
                            rect.center(),
                            egui::Align2::CENTER_CENTER,
                            "Loading...",
                            egui::FontId::default(),
                            egui::Color32::DARK_GRAY,
                        );
                        response.on_hover_text(&name);
                    }
                }
            }
        });

        if clicked.is_some() {
            self.select(clicked);
        }
    }

    fn show_current(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(current) = self.current.clone() else {
            ui.centered_and_justified(|ui| {
                ui.label("No image selected");
            });
            return;
        };

        // Only decode the full image when the selection changed
        let stale = self
            .current_texture
            .as_ref()
            .map(|(path, _)| path != &current)
            .unwrap_or(true);
        if stale {
            self.current_texture = load_texture(ctx, &current, format!("image_{}", current.display()))
                .map(|texture| (current.clone(), texture));
        }

        match &self.current_texture {
            Some((_, texture)) => {
                let size = fit_within(texture.size_vec2(), ui.available_size());
                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), size));
                });
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label(format!("Cannot display {}", current.display()));
                });
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_batch_results(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.show_toolbar(ctx, ui);
        });

        let side_width = self
            .thumbnailer
            .board()
            .thumbnail_width()
            .unwrap_or(self.config.thumbnail_width) as f32
            + SIDE_PANEL_MARGIN;
        egui::SidePanel::right("thumbnails")
            .resizable(false)
            .exact_width(side_width)
            .show(ctx, |ui| {
                self.show_thumbnails(ctx, ui);
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                self.show_current(ctx, ui);
            });

        ctx.request_repaint(); // Keep updating to pick up finished thumbnails
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Render workers must stop writing before the workspace goes away
        if let Err(e) = self.thumbnailer.finish() {
            log::warn!("{}", e);
        }
    }
}
