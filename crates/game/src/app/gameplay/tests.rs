    use super::*;
    use mintloop::{KeySnapshot, LoopConfig, Runtime, TickOutcome, TransitionPhase};

    use super::play::repeat_label;
    use super::title::PROMPT_TEXT;

    const TICK_MS: f64 = 20.0;

    struct Driver {
        runtime: Runtime,
        now_ms: f64,
    }

    impl Driver {
        fn new(demo: DemoConfig) -> Self {
            let mut config = LoopConfig {
                quick_boot: true,
                ..LoopConfig::default()
            };
            config.input.bindings = default_bindings();
            let mut runtime = Runtime::new(&config, build_registry(&demo));
            runtime.finish_loading(0.0, Ok(())).expect("loaded");
            Self {
                runtime,
                now_ms: 0.0,
            }
        }

        fn step(&mut self, keys: &KeySnapshot) -> TickOutcome {
            self.now_ms += TICK_MS;
            self.runtime.tick(self.now_ms, keys)
        }

        fn idle(&mut self, ticks: u32) {
            for _ in 0..ticks {
                self.step(&KeySnapshot::empty());
            }
        }

        fn hold(&mut self, code: &str, ticks: u32) {
            let keys = KeySnapshot::empty().with_held(code);
            for _ in 0..ticks {
                self.step(&keys);
            }
        }

        fn room(&self) -> Option<&str> {
            self.runtime.current_room().map(|room| room.name())
        }

        fn marker_position(&self) -> (f32, f32) {
            let marker = self.runtime.stage().actives().first().expect("marker");
            (marker.x, marker.y)
        }

        fn paragraph_texts(&self) -> Vec<String> {
            self.runtime
                .stage()
                .paragraphs()
                .iter()
                .filter_map(|paragraph| paragraph.text.clone())
                .collect()
        }
    }

    fn instant_config() -> DemoConfig {
        DemoConfig {
            title_fade_frames: 0,
            title_pause_frames: 0,
            play_fade_frames: 0,
            ..DemoConfig::default()
        }
    }

    fn in_play_room() -> Driver {
        let mut driver = Driver::new(instant_config());
        driver.hold("KeyZ", 1);
        driver.idle(1);
        assert_eq!(driver.room(), Some(PLAY_ROOM));
        driver
    }

    #[test]
    fn title_is_the_starting_room() {
        let driver = Driver::new(DemoConfig::default());

        assert_eq!(driver.room(), Some(TITLE_ROOM));
        assert_eq!(driver.runtime.rooms().phase(), TransitionPhase::FadingIn);
        assert_eq!(driver.runtime.stage().instance_counts().backdrops, 1);
        assert_eq!(driver.runtime.frame_view().overlay_opacity, 1.0);
    }

    #[test]
    fn confirm_on_title_fades_out_then_enters_play() {
        let demo = DemoConfig::default();
        let mut driver = Driver::new(demo.clone());
        driver.idle(demo.title_fade_frames);
        assert_eq!(driver.runtime.rooms().phase(), TransitionPhase::Idle);

        driver.hold("KeyZ", 1);
        assert!(driver.runtime.rooms().is_changing());

        let swap_after = demo.title_fade_frames + demo.title_pause_frames;
        driver.idle(swap_after - 1);
        assert_eq!(driver.room(), Some(TITLE_ROOM));

        assert_eq!(
            driver.step(&KeySnapshot::empty()),
            TickOutcome::Ran { room_changed: true }
        );
        assert_eq!(driver.room(), Some(PLAY_ROOM));
        assert_eq!(driver.runtime.rooms().phase(), TransitionPhase::FadingIn);
    }

    #[test]
    fn prompt_blinks_while_title_is_shown() {
        let mut driver = Driver::new(DemoConfig::default());
        let mut prompt_states = Vec::new();

        for _ in 0..70 {
            driver.step(&KeySnapshot::empty());
            let texts = driver.paragraph_texts();
            prompt_states.push(texts.iter().any(|text| text == PROMPT_TEXT));
        }

        assert_eq!(prompt_states.first().copied(), Some(true));
        assert!(prompt_states.contains(&false));
        assert_eq!(prompt_states.last().copied(), Some(true));
    }

    #[test]
    fn arrows_move_the_marker_within_room_bounds() {
        let mut driver = in_play_room();
        let (start_x, start_y) = driver.marker_position();

        driver.hold("ArrowRight", 3);
        assert_eq!(driver.marker_position(), (start_x + 6.0, start_y));

        driver.hold("ArrowUp", 500);
        assert_eq!(driver.marker_position(), (start_x + 6.0, 0.0));
    }

    #[test]
    fn held_confirm_counts_auto_repeats() {
        let mut driver = in_play_room();
        assert!(driver.paragraph_texts().contains(&repeat_label(0)));

        driver.hold("KeyZ", 28);

        assert!(driver.paragraph_texts().contains(&repeat_label(3)));
    }

    #[test]
    fn back_returns_to_title_without_fading_out() {
        let mut driver = in_play_room();

        assert_eq!(
            driver.step(&KeySnapshot::empty().with_held("KeyX")),
            TickOutcome::Ran { room_changed: true }
        );

        assert_eq!(driver.room(), Some(TITLE_ROOM));
        assert!(driver.paragraph_texts().contains(&PROMPT_TEXT.to_string()));
    }

    #[test]
    fn redirect_room_lands_on_play() {
        let mut driver = Driver::new(instant_config());

        assert_eq!(
            driver.runtime.change_room(REDIRECT_ROOM).expect("registered"),
            mintloop::TransitionOutcome::Swapped
        );

        assert_eq!(driver.room(), Some(PLAY_ROOM));
        assert_eq!(driver.runtime.stage().instance_counts().actives, 1);
    }

    #[test]
    fn demo_config_fills_missing_fields() {
        let demo: DemoConfig =
            serde_json::from_str(r#"{ "marker_speed": 4.5 }"#).expect("valid demo config");

        assert_eq!(demo.marker_speed, 4.5);
        assert_eq!(demo.title_fade_frames, 30);
        assert_eq!(demo.prompt_blink_ticks, 30);
    }
