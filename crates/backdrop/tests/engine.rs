use std::time::{Duration, Instant};

use backdrop::compile::{wrap_effect_fragment, VERTEX_SHADER_GLSL};
use backdrop::gpu::DeviceEvent;
use backdrop::program::build_program;
use backdrop::{
    Backdrop, BackdropOptions, EffectVariant, FrameOutcome, GraphicsDevice, HeadlessDevice,
    ManualScheduler, QualityTier, RenderSession, SessionError, SurfaceSize, ViewportEvents,
};

type TestBackdrop = Backdrop<HeadlessDevice, ManualScheduler>;

fn backdrop_with(options: BackdropOptions, viewport: &ViewportEvents) -> TestBackdrop {
    Backdrop::new(
        HeadlessDevice::new(),
        ManualScheduler::new(),
        viewport.clone(),
        options,
    )
}

fn tick(backdrop: &mut TestBackdrop, at: Instant) -> FrameOutcome {
    let request = backdrop
        .scheduler_mut()
        .fire()
        .expect("a frame should be scheduled");
    backdrop.frame(request, at)
}

fn last_time(backdrop: &TestBackdrop) -> f32 {
    backdrop
        .device()
        .last_draw()
        .and_then(|draw| draw.time())
        .expect("a draw with iTime")
}

fn approx(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn pause_does_not_advance_the_shader_clock() {
    let viewport = ViewportEvents::new(640, 360);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let t0 = Instant::now();
    let at = |secs: u64| t0 + Duration::from_secs(secs);

    backdrop.mount(t0).expect("mount");
    tick(&mut backdrop, at(0));
    approx(last_time(&backdrop), 0.0);
    tick(&mut backdrop, at(5));
    approx(last_time(&backdrop), 5.0);

    backdrop.set_playing(false);
    tick(&mut backdrop, at(5));
    approx(last_time(&backdrop), 5.0);
    tick(&mut backdrop, at(8));
    approx(last_time(&backdrop), 5.0);

    backdrop.set_playing(true);
    tick(&mut backdrop, at(8));
    approx(last_time(&backdrop), 5.0);
    tick(&mut backdrop, at(10));
    approx(last_time(&backdrop), 7.0);
}

#[test]
fn host_colors_reach_the_shader() {
    let viewport = ViewportEvents::new(64, 64);
    let options = BackdropOptions {
        colors: vec![
            "rgb(255,0,0)".to_owned(),
            "rgb(0,255,0)".to_owned(),
            "rgb(0,0,255)".to_owned(),
        ],
        ..BackdropOptions::default()
    };
    let mut backdrop = backdrop_with(options, &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);

    let draw = backdrop.device().last_draw().expect("draw");
    assert_eq!(draw.color(0), Some([1.0, 0.0, 0.0]));
    assert_eq!(draw.color(1), Some([0.0, 1.0, 0.0]));
    assert_eq!(draw.color(2), Some([0.0, 0.0, 1.0]));
}

#[test]
fn palette_change_applies_without_rebuilding() {
    let viewport = ViewportEvents::new(64, 64);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);
    let program = backdrop.device().last_draw().expect("draw").program;
    backdrop.device_mut().clear_history();

    backdrop.set_colors(&["not-a-color", "rgb(0, 0, 0)"]);
    tick(&mut backdrop, now + Duration::from_secs(1));

    let defaults = backdrop.effect().default_palette();
    let draw = backdrop.device().last_draw().expect("draw");
    assert_eq!(draw.program, program);
    assert_eq!(draw.color(0), Some(defaults.slot(0)));
    assert_eq!(draw.color(1), Some([0.0, 0.0, 0.0]));
    assert_eq!(draw.color(2), Some(defaults.slot(2)));
    approx(draw.time().expect("time"), 1.0);
    assert!(!backdrop
        .device()
        .events()
        .iter()
        .any(|event| matches!(event, DeviceEvent::ProgramLinked(_))));
}

#[test]
fn unmount_twice_releases_once() {
    let viewport = ViewportEvents::new(200, 100);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);
    let stale = backdrop
        .scheduler_mut()
        .fire()
        .expect("the loop keeps one frame scheduled");

    backdrop.unmount();
    backdrop.unmount();

    assert!(backdrop.device().live_resources().is_empty());
    assert_eq!(backdrop.scheduler().outstanding(), 0);
    assert_eq!(viewport.listener_count(), 0);
    let deletes = |wanted: fn(&DeviceEvent) -> bool| {
        backdrop.device().events().iter().filter(|event| wanted(event)).count()
    };
    assert_eq!(deletes(|event| matches!(event, DeviceEvent::ProgramDeleted(_))), 1);
    assert_eq!(deletes(|event| matches!(event, DeviceEvent::BufferDeleted(_))), 1);

    let draws = backdrop.device().draws().len();
    assert_eq!(backdrop.frame(stale, now), FrameOutcome::Stale);
    assert_eq!(backdrop.device().draws().len(), draws);
}

#[test]
fn resize_reaches_the_next_draw() {
    let viewport = ViewportEvents::new(800, 600);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);
    assert_eq!(
        backdrop.device().last_draw().expect("draw").resolution(),
        Some([800.0, 600.0])
    );

    viewport.notify(1024, 768);
    assert_eq!(backdrop.surface_size(), Some(SurfaceSize::new(1024, 768)));

    tick(&mut backdrop, now);
    let draw = backdrop.device().last_draw().expect("draw");
    assert_eq!(draw.resolution(), Some([1024.0, 768.0]));
    assert_eq!(draw.viewport, SurfaceSize::new(1024, 768));
}

#[test]
fn low_quality_halves_the_backing_surface() {
    let viewport = ViewportEvents::new(1280, 720);
    let options = BackdropOptions {
        quality: QualityTier::Low,
        ..BackdropOptions::default()
    };
    let mut backdrop = backdrop_with(options, &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);
    assert_eq!(
        backdrop.device().last_draw().expect("draw").resolution(),
        Some([640.0, 360.0])
    );

    backdrop.set_quality(QualityTier::High, now).expect("rebuild");
    tick(&mut backdrop, now);
    assert_eq!(
        backdrop.device().last_draw().expect("draw").resolution(),
        Some([1280.0, 720.0])
    );
    let counts = backdrop.device().live_resources();
    assert_eq!((counts.programs, counts.buffers), (1, 1));
}

#[test]
fn large_viewports_stay_one_to_one_at_high_quality() {
    let viewport = ViewportEvents::new(800, 600);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    tick(&mut backdrop, now);

    viewport.notify(5120, 2880);
    tick(&mut backdrop, now);
    let draw = backdrop.device().last_draw().expect("draw");
    assert_eq!(draw.resolution(), Some([5120.0, 2880.0]));
    assert_eq!(draw.viewport, SurfaceSize::new(5120, 2880));
    assert_eq!(backdrop.surface_size(), Some(SurfaceSize::new(5120, 2880)));
}

#[test]
fn quality_change_keeps_the_shader_clock() {
    let viewport = ViewportEvents::new(1280, 720);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let t0 = Instant::now();
    let at = |secs: u64| t0 + Duration::from_secs(secs);

    backdrop.mount(t0).expect("mount");
    tick(&mut backdrop, at(0));
    tick(&mut backdrop, at(5));
    approx(last_time(&backdrop), 5.0);

    backdrop.set_quality(QualityTier::Low, at(5)).expect("rebuild");
    tick(&mut backdrop, at(6));
    approx(last_time(&backdrop), 6.0);
    assert_eq!(
        backdrop.device().last_draw().expect("draw").resolution(),
        Some([640.0, 360.0])
    );

    backdrop.set_playing(false);
    tick(&mut backdrop, at(7));
    backdrop.set_quality(QualityTier::High, at(9)).expect("rebuild");
    tick(&mut backdrop, at(10));
    approx(last_time(&backdrop), 7.0);
}

#[test]
fn effect_switch_releases_before_building() {
    let viewport = ViewportEvents::new(320, 200);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let t0 = Instant::now();
    backdrop.mount(t0).expect("mount");
    tick(&mut backdrop, t0 + Duration::from_secs(3));
    let old = backdrop.device().last_draw().expect("draw").program;
    backdrop.device_mut().clear_history();

    backdrop
        .set_effect(EffectVariant::RadialRing, t0 + Duration::from_secs(3))
        .expect("switch");

    let events = backdrop.device().events();
    let deleted = events
        .iter()
        .position(|event| *event == DeviceEvent::ProgramDeleted(old))
        .expect("old program released");
    let linked = events
        .iter()
        .position(|event| matches!(event, DeviceEvent::ProgramLinked(_)))
        .expect("new program linked");
    assert!(deleted < linked, "events out of order: {events:?}");

    let counts = backdrop.device().live_resources();
    assert_eq!((counts.shaders, counts.programs, counts.buffers), (0, 1, 1));
    assert_eq!(backdrop.scheduler().outstanding(), 1);
    assert_eq!(viewport.listener_count(), 1);

    tick(&mut backdrop, t0 + Duration::from_secs(4));
    let draw = backdrop.device().last_draw().expect("draw");
    assert_ne!(draw.program, old);
    approx(draw.time().expect("time"), 1.0);
    let palette = EffectVariant::RadialRing.default_palette();
    assert_eq!(draw.color(0), Some(palette.slot(0)));
}

#[test]
fn broken_shader_never_draws() {
    let viewport = ViewportEvents::new(320, 200);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    backdrop
        .device_mut()
        .reject_sources_containing(Some("iResolution"));

    let err = backdrop.mount(Instant::now()).expect_err("build fails");
    assert!(matches!(err, SessionError::Build { .. }));
    assert!(backdrop.is_mounted());
    assert!(!backdrop.is_rendering());
    assert_eq!(backdrop.scheduler().outstanding(), 0);
    assert!(backdrop.device().draws().is_empty());
    assert!(backdrop.device().live_resources().is_empty());
    assert_eq!(viewport.listener_count(), 0);

    backdrop.device_mut().reject_sources_containing(None);
    backdrop
        .set_effect(EffectVariant::WaveLines, Instant::now())
        .expect("a later switch recovers");
    assert!(backdrop.is_rendering());
}

#[test]
fn broken_fragment_source_fails_to_build() {
    let mut device = HeadlessDevice::new();
    let fragment = wrap_effect_fragment(
        "uniform float iTime;\nvoid main() { gl_FragColor = vec4(undefinedValue, iTime, 0.0, 1.0); }",
    );
    assert!(build_program(&mut device, VERTEX_SHADER_GLSL, &fragment).is_err());
    assert!(device.live_resources().is_empty());
    assert!(device.draws().is_empty());
}

#[test]
fn failed_switch_can_fall_back() {
    let viewport = ViewportEvents::new(100, 100);
    let options = BackdropOptions {
        effect: EffectVariant::WarpMelt,
        fallback_to_previous: true,
        ..BackdropOptions::default()
    };
    let mut backdrop = backdrop_with(options, &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    backdrop
        .device_mut()
        .reject_sources_containing(Some("drawRing"));

    let err = backdrop
        .set_effect(EffectVariant::RadialRing, now)
        .expect_err("radial ring is rejected");
    assert!(matches!(
        err,
        SessionError::Build {
            effect: EffectVariant::RadialRing,
            ..
        }
    ));
    assert_eq!(backdrop.effect(), EffectVariant::WarpMelt);
    assert!(backdrop.is_rendering());
    assert_eq!(backdrop.scheduler().outstanding(), 1);
    tick(&mut backdrop, now);
    assert!(backdrop.device().last_draw().is_some());
}

#[test]
fn failed_switch_without_fallback_stays_blank() {
    let viewport = ViewportEvents::new(100, 100);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    backdrop
        .device_mut()
        .reject_sources_containing(Some("drawRing"));

    assert!(backdrop.set_effect(EffectVariant::RadialRing, now).is_err());
    assert_eq!(backdrop.effect(), EffectVariant::RadialRing);
    assert!(!backdrop.is_rendering());
    assert_eq!(backdrop.scheduler().outstanding(), 0);
    assert!(backdrop.device().live_resources().is_empty());
}

#[test]
fn failed_draws_keep_the_loop_alive() {
    let viewport = ViewportEvents::new(100, 100);
    let mut backdrop = backdrop_with(BackdropOptions::default(), &viewport);
    let now = Instant::now();
    backdrop.mount(now).expect("mount");
    backdrop.device_mut().fail_draws(true);

    assert_eq!(tick(&mut backdrop, now), FrameOutcome::DrawFailed);
    assert_eq!(backdrop.scheduler().outstanding(), 1);

    backdrop.device_mut().fail_draws(false);
    assert_eq!(tick(&mut backdrop, now), FrameOutcome::Rendered);
}

#[test]
fn every_effect_compiles_and_draws() {
    for effect in EffectVariant::ALL {
        let mut device = HeadlessDevice::new();
        let viewport = ViewportEvents::new(256, 144);
        let now = Instant::now();
        let mut session = RenderSession::open(
            &mut device,
            &viewport,
            effect,
            QualityTier::High.sizing(),
            now,
        )
        .unwrap_or_else(|err| panic!("{effect} failed to build: {err}"));
        session
            .tick(&mut device, true, &effect.default_palette(), now)
            .unwrap_or_else(|err| panic!("{effect} failed to draw: {err}"));

        let draw = device.last_draw().expect("draw");
        assert_eq!(draw.vertex_count, 4, "{effect}");
        assert_eq!(draw.resolution(), Some([256.0, 144.0]), "{effect}");
        assert_eq!(draw.time(), Some(0.0), "{effect}");

        session.close(&mut device);
        assert!(device.live_resources().is_empty(), "{effect}");
    }
}

#[test]
fn independent_backdrops_share_only_the_viewport() {
    let viewport = ViewportEvents::new(300, 300);
    let mut first = backdrop_with(BackdropOptions::default(), &viewport);
    let mut second = backdrop_with(
        BackdropOptions {
            effect: EffectVariant::SwirlFlow,
            playing: false,
            ..BackdropOptions::default()
        },
        &viewport,
    );
    let t0 = Instant::now();
    first.mount(t0).expect("first");
    second.mount(t0).expect("second");
    assert_eq!(viewport.listener_count(), 2);
    tick(&mut first, t0);
    tick(&mut second, t0);

    viewport.notify(400, 200);
    tick(&mut first, t0 + Duration::from_secs(2));
    tick(&mut second, t0 + Duration::from_secs(2));
    approx(last_time(&first), 2.0);
    approx(last_time(&second), 0.0);
    for backdrop in [&first, &second] {
        assert_eq!(
            backdrop.device().last_draw().expect("draw").resolution(),
            Some([400.0, 200.0])
        );
    }

    drop(first);
    assert_eq!(viewport.listener_count(), 1);
}
