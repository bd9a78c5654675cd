// SPDX-License-Identifier: GPL-3.0-only

//! Terminal viewer
//!
//! Renders the depth image, the thresholded mask with blob outlines, or a
//! slowly rotating point cloud using Unicode half-block characters, with the
//! status report underneath.

use crate::app::App;
use crate::backends::{DepthSource, FrameSink, Sensor};
use crate::constants::tick_interval;
use crate::pipeline::{InputEvent, PointCloud, ViewMode, view_position};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::{Rgb, RgbImage};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::time::{Duration, Instant};
use tracing::info;

const OUTLINE: Rgb<u8> = Rgb([255, 40, 40]);
const CENTROID: Rgb<u8> = Rgb([40, 255, 40]);
/// Radians per second of point cloud rotation
const CLOUD_SPIN: f32 = 0.4;

/// Run the viewer until the user quits
pub fn run<S: Sensor, K: FrameSink>(app: &mut App<S, K>) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown();
    result
}

fn run_app<S: Sensor, K: FrameSink>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<S, K>,
) -> Result<(), Box<dyn std::error::Error>> {
    let interval = tick_interval(app.settings().frame_rate);
    let started = Instant::now();

    loop {
        let tick_start = Instant::now();
        app.tick()?;

        terminal.draw(|f| {
            let area = f.area();
            let status = app.status_lines();
            let status_height = (status.len() as u16).min(area.height / 2);
            let view_area = Rect {
                height: area.height.saturating_sub(status_height),
                ..area
            };
            let status_area = Rect {
                y: area.y + view_area.height,
                height: status_height,
                ..area
            };

            match app.config().view_mode {
                ViewMode::Live => render_live(f.buffer_mut(), view_area, app),
                ViewMode::PointCloud => {
                    let angle = started.elapsed().as_secs_f32() * CLOUD_SPIN;
                    let canvas = render_cloud(
                        app.pipeline().cloud(),
                        view_area.width as u32,
                        view_area.height as u32 * 2,
                        angle,
                    );
                    f.render_widget(&HalfBlockImage(&canvas), view_area);
                }
            }

            f.render_widget(StatusPanel { lines: &status }, status_area);
        })?;

        let timeout = interval.saturating_sub(tick_start.elapsed());
        if event::poll(timeout.max(Duration::from_millis(1)))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let quit = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL));
            if quit {
                info!("Quit requested");
                break;
            }

            let input = match key.code {
                KeyCode::Up => Some(InputEvent::TiltUp),
                KeyCode::Down => Some(InputEvent::TiltDown),
                KeyCode::Char(c) => InputEvent::from_char(c),
                _ => None,
            };
            if let Some(input) = input {
                app.handle_input(input);
            }
        }
    }

    Ok(())
}

/// Split `area` into top-left, top-right and bottom-left quadrants
fn live_panels(area: Rect) -> [Rect; 3] {
    let half_w = area.width / 2;
    let half_h = area.height / 2;
    [
        Rect {
            width: half_w,
            height: half_h,
            ..area
        },
        Rect {
            x: area.x + half_w,
            width: area.width - half_w,
            height: half_h,
            ..area
        },
        Rect {
            y: area.y + half_h,
            width: half_w,
            height: area.height - half_h,
            ..area
        },
    ]
}

/// Depth and color on top, mask with blob outlines below
fn render_live<S: Sensor, K: FrameSink>(buf: &mut Buffer, area: Rect, app: &App<S, K>) {
    let [depth_area, color_area, mask_area] = live_panels(area);

    let Some(depth) = app.source().depth_raster() else {
        Placeholder("Waiting for depth frames...").render(area, buf);
        return;
    };

    let depth_image = gray_to_rgb(depth.as_image());
    HalfBlockImage(&depth_image).render(depth_area, buf);

    match app.source().color_image() {
        Some(color) => HalfBlockImage(color).render(color_area, buf),
        None => Placeholder("No color frames").render(color_area, buf),
    }

    let Some(mask) = app.pipeline().mask() else {
        return;
    };
    let mut overlay = gray_to_rgb(mask.as_image());
    for blob in app.pipeline().blobs() {
        for &(x, y) in &blob.points {
            overlay.put_pixel(x, y, OUTLINE);
        }
        draw_cross(&mut overlay, blob.centroid, CENTROID);
    }
    HalfBlockImage(&overlay).render(mask_area, buf);
}

fn gray_to_rgb(gray: &image::GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

fn draw_cross(image: &mut RgbImage, center: (f32, f32), color: Rgb<u8>) {
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for d in -3i64..=3 {
        for (x, y) in [(cx + d, cy), (cx, cy + d)] {
            if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Project the cloud onto a `width` x `height` canvas, rotated about the
/// vertical axis through the scene center
pub fn render_cloud(cloud: &PointCloud, width: u32, height: u32, angle: f32) -> RgbImage {
    let mut canvas = RgbImage::new(width.max(1), height.max(1));
    if width == 0 || height == 0 {
        return canvas;
    }

    // Rotate around the point one metre in front of the viewer
    const PIVOT_Z: f32 = -1000.0;
    const CAMERA_DISTANCE: f32 = 1500.0;
    let (sin, cos) = angle.sin_cos();
    let focal = height as f32;
    let (half_w, half_h) = (width as f32 / 2.0, height as f32 / 2.0);
    let mut zbuf = vec![f32::INFINITY; (width * height) as usize];

    for point in cloud.points() {
        let [x, y, z] = view_position(point);
        let rz = z - PIVOT_Z;
        let x_rot = x * cos + rz * sin;
        let z_rot = -x * sin + rz * cos;
        let depth = CAMERA_DISTANCE - z_rot;
        if depth <= 1.0 {
            continue;
        }

        let sx = half_w + focal * x_rot / depth;
        let sy = half_h - focal * y / depth;
        if sx < 0.0 || sy < 0.0 || sx >= width as f32 || sy >= height as f32 {
            continue;
        }
        let (px, py) = (sx as u32, sy as u32);
        let idx = (py * width + px) as usize;
        if depth < zbuf[idx] {
            zbuf[idx] = depth;
            let c = point.color;
            canvas.put_pixel(px, py, Rgb([c[0], c[1], c[2]]));
        }
    }

    canvas
}

/// Image drawn with half-block characters, two pixels per cell
struct HalfBlockImage<'a>(&'a RgbImage);

impl Widget for &HalfBlockImage<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let image = self.0;
        if image.width() == 0 || image.height() == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Fit inside the area keeping aspect ratio
        let aspect = image.width() as f64 / image.height() as f64;
        let term_w = area.width as f64;
        let term_h = (area.height * 2) as f64;
        let (display_w, display_h) = if term_w / term_h > aspect {
            ((term_h * aspect) as u16, area.height)
        } else {
            (area.width, ((term_w / aspect) / 2.0) as u16)
        };
        if display_w == 0 || display_h == 0 {
            return;
        }

        let x_offset = area.x + (area.width - display_w) / 2;
        let y_offset = area.y + (area.height - display_h) / 2;
        let x_scale = image.width() as f64 / display_w as f64;
        let y_scale = image.height() as f64 / (display_h as f64 * 2.0);

        for ty in 0..display_h {
            for tx in 0..display_w {
                let src_x = ((tx as f64 * x_scale) as u32).min(image.width() - 1);
                let top_y = ((ty as f64 * 2.0 * y_scale) as u32).min(image.height() - 1);
                let bottom_y = (((ty as f64 * 2.0 + 1.0) * y_scale) as u32).min(image.height() - 1);

                let [tr, tg, tb] = image.get_pixel(src_x, top_y).0;
                let [br, bg, bb] = image.get_pixel(src_x, bottom_y).0;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(tr, tg, tb));
                    cell.set_bg(Color::Rgb(br, bg, bb));
                }
            }
        }
    }
}

impl Widget for HalfBlockImage<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        (&self).render(area, buf);
    }
}

struct Placeholder(&'static str);

impl Widget for Placeholder {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let x = area.x + area.width.saturating_sub(self.0.len() as u16) / 2;
        let y = area.y + area.height / 2;
        if y < area.bottom() && x < area.right() {
            buf.set_string(x, y, self.0, Style::default());
        }
    }
}

struct StatusPanel<'a> {
    lines: &'a [String],
}

impl Widget for StatusPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        for row in 0..area.height {
            let y = area.y + row;
            for x in area.left()..area.right() {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_char(' ');
                    cell.set_bg(Color::DarkGray);
                }
            }
            if let Some(line) = self.lines.get(row as usize) {
                let text: String = line.chars().take(area.width as usize).collect();
                buf.set_string(area.x, y, text, style);
            }
        }
    }
}
