use std::io::Write;

use ember::prelude::*;
use geese::*;
use glam::Vec2;
use log::{debug, info, warn};
use palette::Srgba;

fn main() -> anyhow::Result<()> {
    std::env::set_var("RUST_BACKTRACE", "1");
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "ember=debug,ember_core=debug,wgpu=error");
    }
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_millis();
            let path = record.module_path().unwrap_or_default();
            writeln!(buf, "[{ts} {:5} {path}]: {}", record.level(), record.args())
        })
        .init();

    let mut engine = EmberEngine::new();
    engine
        .get_ctx()
        .flush()
        .with(geese::notify::add_system::<Game>());
    engine.create_window(
        "Ember batch renderer",
        Some(winit::dpi::PhysicalSize::new(800, 600)),
    );
    engine.run()
}

struct Game {
    ctx: GeeseContextHandle<Self>,

    checker: Option<AssetHandle<TextureAsset>>,
    bricks: Option<AssetHandle<TextureAsset>>,
    frames: u32,
}
impl Game {
    /// Side length of the colored checkerboard, in quads.
    const GRID: i32 = 8;
    const STATS_INTERVAL: u32 = 240;

    fn on_frame(&mut self, _: &events::NewFrame) {
        self.frames += 1;
        if self.frames % Self::STATS_INTERVAL == 0 {
            let mut renderer = self.ctx.get_mut::<BatchRenderer>();
            let stats = renderer.stats();
            debug!(
                "{} quads over {} draw calls in the last {} frames",
                stats.quads,
                stats.draw_calls,
                Self::STATS_INTERVAL
            );
            renderer.reset_stats();
        }
    }

    fn on_draw(&mut self, _: &events::Draw) {
        let mut renderer = self.ctx.get_mut::<BatchRenderer>();

        for y in 0..Self::GRID {
            for x in 0..Self::GRID {
                let color = match (x + y) % 2 == 0 {
                    true => Srgba::new(0.9, 0.45, 0.2, 1.0),
                    false => Srgba::new(0.2, 0.5, 0.85, 1.0),
                };
                renderer.draw_quad(&Quad {
                    position: Vec2::new(x as f32, y as f32),
                    size: Vec2::ONE,
                    color,
                    texture: None,
                });
            }
        }

        // A row of textured quads above the board, alternating textures
        for x in 0..Self::GRID {
            let texture = match x % 2 == 0 {
                true => self.checker.clone(),
                false => self.bricks.clone(),
            };
            renderer.draw_quad(&Quad {
                position: Vec2::new(x as f32, Self::GRID as f32 + 0.5),
                size: Vec2::ONE,
                color: Srgba::new(1.0, 1.0, 1.0, 1.0),
                texture,
            });
        }
    }
}
impl GeeseSystem for Game {
    const EVENT_HANDLERS: EventHandlers<Self> = event_handlers()
        .with(Self::on_frame)
        .with(Self::on_draw);

    const DEPENDENCIES: geese::Dependencies = dependencies()
        .with::<Mut<AssetSystem>>()
        .with::<Mut<BatchRenderer>>()
        .with::<Mut<Camera>>();

    fn new(mut ctx: GeeseContextHandle<Self>) -> Self {
        info!("Game created");

        let mut asset_sys = ctx.get_mut::<AssetSystem>();
        // Texture load failures are not fatal, the demo just draws
        // colored quads instead
        let checker = match asset_sys.load::<TextureAsset>("assets/checker.png") {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Textured quads disabled: {e}");
                None
            }
        };
        let bricks = match asset_sys.load::<TextureAsset>("assets/bricks.png") {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Textured quads disabled: {e}");
                None
            }
        };
        drop(asset_sys);

        let mut camera = ctx.get_mut::<Camera>();
        camera.set_position(Vec2::new(Self::GRID as f32 / 2.0, Self::GRID as f32 / 2.0 + 0.75));
        camera.set_view_height(Self::GRID as f32 + 4.0);
        drop(camera);

        Self {
            ctx,
            checker,
            bricks,
            frames: 0,
        }
    }
}
