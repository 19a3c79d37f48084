    use std::collections::BTreeMap;
    use std::time::Instant;

    use super::*;
    use serde_json::json;
    use tilegrid_engine::app::{parse_key_name, TileAtlases, Viewport, LAYER_ACTORS};
    use tilegrid_engine::grid::{manhattan_distance, GridMap, TileRef};
    use tilegrid_engine::FrameReport;

    const SCREEN_PX: u32 = 320;

    fn key_table() -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
        serde_json::from_value(json!({
            "view": {
                "up": ["w"], "down": ["s"], "left": ["a"], "right": ["d"],
                "zoom_in": ["+", "KP_PLUS"], "zoom_out": ["-", "KP_MINUS"]
            },
            "cursor": { "up": ["UP"], "down": ["DOWN"], "left": ["LEFT"], "right": ["RIGHT"] },
            "select": { "select": ["SPACE"], "path": ["RETURN"], "clear": ["c"], "quit": ["ESCAPE"] }
        }))
        .expect("key table")
    }

    fn demo_engine() -> (Engine, SharedKeyBindings, Instant) {
        let mut state = GameState::new(Viewport::new(SCREEN_PX, SCREEN_PX));
        let map = GridMap::new(8, 8, vec![TileRef::Static(0); 64], Vec::new()).expect("map");
        state.set_map(map);
        state.layers_mut().spawn(
            LAYER_ACTORS,
            Vec2::new(2.0, 2.0),
            SpriteDesc::new(MAP_TILE_SET, TileKey::Index(0)),
        );
        let mut engine = Engine::new(state, TileAtlases::default());
        let bindings = KeyBindings::from_table(&key_table()).expect("bindings");
        let demo = DemoConfig {
            cursor_start: [2, 2],
            ..DemoConfig::default()
        };
        let installed_at = Instant::now();
        let shared = install(&mut engine, bindings, &demo);
        (engine, shared, installed_at)
    }

    fn step_at(engine: &mut Engine, now: Instant) -> FrameReport {
        let mut frame = vec![0; (SCREEN_PX * SCREEN_PX * 4) as usize];
        engine.run_frame(&mut frame, SCREEN_PX, SCREEN_PX, now)
    }

    fn press(engine: &mut Engine, name: &str) {
        let key = parse_key_name(name).expect("key name");
        engine.push_event(InputEvent::KeyDown(key));
        engine.push_event(InputEvent::KeyUp(key));
        step_at(engine, Instant::now());
    }

    fn tint(engine: &Engine, x: i32, y: i32) -> Option<Color> {
        engine
            .state()
            .map()
            .and_then(|map| map.tint(GridPoint::new(x, y)))
    }

    fn tint_len(engine: &Engine) -> usize {
        engine.state().map().map_or(0, |map| map.tint_len())
    }

    #[test]
    fn install_spawns_cursor_centered_on_start() {
        let (engine, _, _) = demo_engine();
        let state = engine.state();
        assert_eq!(state.cursor_position(), Some(GridPoint::new(2, 2)));
        let viewport = state.viewport();
        let top_left = viewport.transform_pos(Vec2::new(2.0, 2.0));
        let half_cell = viewport.cell_size_px() / 2.0;
        assert!((top_left.x + half_cell - SCREEN_PX as f32 / 2.0).abs() < 1.0);
        assert!((top_left.y + half_cell - SCREEN_PX as f32 / 2.0).abs() < 1.0);
        assert_eq!(state.layers().entity_count(), 2);
    }

    #[test]
    fn arrow_keys_move_cursor_and_keep_it_centered() {
        let (mut engine, _, _) = demo_engine();
        press(&mut engine, "RIGHT");
        press(&mut engine, "DOWN");
        let state = engine.state();
        assert_eq!(state.cursor_position(), Some(GridPoint::new(3, 3)));
        let viewport = state.viewport();
        let top_left = viewport.transform_pos(Vec2::new(3.0, 3.0));
        let half_cell = viewport.cell_size_px() / 2.0;
        assert!((top_left.x + half_cell - SCREEN_PX as f32 / 2.0).abs() < 1.0);
    }

    #[test]
    fn cursor_stays_on_the_map() {
        let (mut engine, _, _) = demo_engine();
        for _ in 0..5 {
            press(&mut engine, "LEFT");
        }
        assert_eq!(engine.state().cursor_position(), Some(GridPoint::new(0, 2)));
    }

    #[test]
    fn view_keys_pan_by_one_tile() {
        let (mut engine, _, _) = demo_engine();
        let before = engine.state().viewport().offset();
        press(&mut engine, "w");
        press(&mut engine, "d");
        let after = engine.state().viewport().offset();
        assert!((after.y - (before.y - PAN_STEP_PX)).abs() < 1e-3);
        assert!((after.x - (before.x + PAN_STEP_PX)).abs() < 1e-3);
    }

    #[test]
    fn zoom_keys_change_scale_and_recenter() {
        let (mut engine, _, _) = demo_engine();
        let before = engine.state().viewport().scale();
        press(&mut engine, "+");
        let viewport = engine.state().viewport();
        assert!(viewport.scale() > before);
        let top_left = viewport.transform_pos(Vec2::new(2.0, 2.0));
        let half_cell = viewport.cell_size_px() / 2.0;
        assert!((top_left.x + half_cell - SCREEN_PX as f32 / 2.0).abs() < 1.0);

        engine.push_event(InputEvent::MouseWheel { steps: -2 });
        step_at(&mut engine, Instant::now());
        assert!(engine.state().viewport().scale() < before);
    }

    #[test]
    fn space_selects_actor_and_tints_reachable_cells() {
        let (mut engine, _, _) = demo_engine();
        press(&mut engine, "SPACE");
        assert!(engine.state().selected().is_some());

        let origin = GridPoint::new(2, 2);
        let expected = (0..8)
            .flat_map(|x| (0..8).map(move |y| GridPoint::new(x, y)))
            .filter(|point| manhattan_distance(origin, *point) <= 4)
            .count();
        assert_eq!(tint_len(&engine), expected);
        assert_eq!(tint(&engine, 6, 2), Some(REACH_TINT));
        assert_eq!(tint(&engine, 7, 2), None);
    }

    #[test]
    fn return_tints_path_from_selection_to_cursor() {
        let (mut engine, _, _) = demo_engine();
        press(&mut engine, "SPACE");
        for _ in 0..3 {
            press(&mut engine, "RIGHT");
        }
        press(&mut engine, "RETURN");
        assert_eq!(tint_len(&engine), 4);
        assert_eq!(tint(&engine, 2, 2), Some(PATH_TINT));
        assert_eq!(tint(&engine, 5, 2), Some(PATH_TINT));
    }

    #[test]
    fn return_without_selection_does_nothing() {
        let (mut engine, _, _) = demo_engine();
        press(&mut engine, "RETURN");
        assert_eq!(tint_len(&engine), 0);
    }

    #[test]
    fn space_on_empty_cell_and_clear_key_reset_selection() {
        let (mut engine, _, _) = demo_engine();
        press(&mut engine, "SPACE");
        press(&mut engine, "UP");
        press(&mut engine, "SPACE");
        assert_eq!(engine.state().selected(), None);
        assert_eq!(tint_len(&engine), 0);

        press(&mut engine, "DOWN");
        press(&mut engine, "SPACE");
        assert!(tint_len(&engine) > 0);
        press(&mut engine, "c");
        assert_eq!(engine.state().selected(), None);
        assert_eq!(tint_len(&engine), 0);
    }

    #[test]
    fn escape_requests_stop() {
        let (mut engine, _, _) = demo_engine();
        assert!(!engine.should_stop());
        press(&mut engine, "ESCAPE");
        assert!(engine.should_stop());
    }

    #[test]
    fn held_keys_repeat_on_the_timer() {
        let (mut engine, shared, installed_at) = demo_engine();
        let right = parse_key_name("RIGHT").expect("key");
        engine.push_event(InputEvent::KeyDown(right));
        step_at(&mut engine, installed_at);
        assert_eq!(engine.state().cursor_position(), Some(GridPoint::new(3, 2)));
        assert_eq!(shared.borrow().held_keys(), &[right]);

        step_at(&mut engine, installed_at + KEY_REPEAT_INTERVAL * 2);
        assert_eq!(engine.state().cursor_position(), Some(GridPoint::new(4, 2)));

        engine.push_event(InputEvent::KeyUp(right));
        step_at(&mut engine, installed_at + KEY_REPEAT_INTERVAL * 5);
        assert_eq!(engine.state().cursor_position(), Some(GridPoint::new(4, 2)));
    }

    #[test]
    fn left_click_places_cursor_on_clicked_cell() {
        let (mut engine, _, _) = demo_engine();
        let viewport = engine.state().viewport();
        let cell = viewport.transform_pos(Vec2::new(3.0, 1.0));
        let position = Vec2::new(cell.x + 1.0, cell.y + 1.0);
        engine.push_event(InputEvent::MouseDown {
            button: MouseButton::Left,
            position,
        });
        step_at(&mut engine, Instant::now());
        assert_eq!(engine.state().cursor_position(), Some(GridPoint::new(3, 1)));
    }

    #[test]
    fn demo_config_reads_demo_section_with_defaults() {
        let config = Config::parse(
            r#"{ "demo": { "move_budget": 2.5, "cursor_start": [1, 3] } }"#,
            "inline",
        )
        .expect("config");
        let demo = DemoConfig::from_config(&config).expect("demo config");
        assert_eq!(demo.cursor_start, [1, 3]);
        assert!((demo.move_budget - 2.5).abs() < f32::EPSILON);
        assert_eq!(demo.cursor_pose, TileKey::from("cursor"));
        assert_eq!(
            DemoConfig::from_config(&Config::default()).expect("defaults"),
            DemoConfig::default()
        );
    }
