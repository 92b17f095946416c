//! End-to-end determinism tests: identical runs, demo round trips,
//! save round trips, and the property suite over the codecs.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};

use stygia::compat::resolver::{self, Overrides, UserDefaults};
use stygia::compat::CompatLevel;
use stygia::core::rng::{Rng, RngClass};
use stygia::demo::codec::{self, DemoHeader};
use stygia::demo::DemoRecorder;
use stygia::game::ticcmd::TicCmd;
use stygia::game::{GameAction, GameMode, MapSet, Skill, TicCmdSet};
use stygia::save::serializer;
use stygia::wad::WadDirectory;
use stygia::{Game, BACKUPTICS};

fn behavior(level: CompatLevel, seed: u32) -> stygia::Behavior {
    let mut d = UserDefaults::default();
    d.complevel = level;
    resolver::resolve(&d, None, &Overrides::default(), seed, false)
}

fn fresh_game(level: CompatLevel, seed: u32) -> Game {
    let mut game = Game::new(
        behavior(level, seed),
        GameMode::Commercial,
        WadDirectory::default(),
        MapSet::arena_only(),
    );
    game.playeringame[0] = true;
    game.d_skill = Skill::Hard;
    game.d_episode = 1;
    game.d_map = 1;
    game.gameaction = GameAction::NewGame;
    game
}

/// A scripted, reproducible cmd stream: movement and fire only, no
/// specials.
fn scripted_cmds(count: usize, seed: u64) -> Vec<TicCmd> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| TicCmd {
            forwardmove: rng.gen_range(-50..=50),
            sidemove: rng.gen_range(-40..=40),
            angleturn: rng.gen_range(-1280..=1280),
            buttons: if rng.gen_bool(0.2) { 1 } else { 0 }, // BT_ATTACK
            ..Default::default()
        })
        .collect()
}

fn run_cmds(game: &mut Game, cmds: &[TicCmd]) -> Vec<i16> {
    let mut history = Vec::with_capacity(cmds.len());
    for cmd in cmds {
        let mut set = TicCmdSet::default();
        set.cmds[0] = *cmd;
        // What build_ticcmd would stamp in: the predicted word from
        // the local table.
        set.cmds[0].consistency =
            game.consistency[0][(game.gametic / game.ticdup) as usize % BACKUPTICS];
        set.ingame[0] = true;
        game.ticker(&set);
        game.gametic += 1;
        let _ = game.take_sounds();
        history.push(game.player_consistency(0));
    }
    history
}

#[test]
fn identical_runs_produce_identical_history() {
    let cmds = scripted_cmds(500, 0xdecade);
    let mut a = fresh_game(CompatLevel::Mbf, 1993);
    let mut b = fresh_game(CompatLevel::Mbf, 1993);

    let ha = run_cmds(&mut a, &cmds);
    let hb = run_cmds(&mut b, &cmds);

    assert_eq!(ha, hb);
    assert_eq!(a.rng.indices(), b.rng.indices());
    assert_eq!(a.players[0].killcount, b.players[0].killcount);
    assert_eq!(a.players[0].itemcount, b.players[0].itemcount);
    assert_eq!(a.players[0].secretcount, b.players[0].secretcount);
}

#[test]
fn different_seed_diverges_at_mbf() {
    let cmds = scripted_cmds(300, 7);
    let mut a = fresh_game(CompatLevel::Mbf, 1);
    let mut b = fresh_game(CompatLevel::Mbf, 2);
    let ha = run_cmds(&mut a, &cmds);
    let hb = run_cmds(&mut b, &cmds);
    // Monster behavior differs through the seed mix, and sooner or
    // later that reaches the player's position word.
    assert!(
        ha != hb || a.rng.indices() != b.rng.indices(),
        "seeded runs never diverged"
    );
}

#[test]
fn demo_record_playback_round_trip() {
    let tics = 1000;
    let cmds = scripted_cmds(tics, 0xbeef);

    // Record.
    let mut rec_game = fresh_game(CompatLevel::Mbf, 555);
    let header = DemoHeader {
        version: 203,
        level: CompatLevel::Mbf,
        longtics: false,
        skill: Skill::Hard,
        episode: 1,
        map: 1,
        deathmatch: 0,
        consoleplayer: 0,
        playeringame: [true, false, false, false],
        umapinfo_map: None,
    };
    let name = format!(
        "{}/stygia-rt-{}",
        std::env::temp_dir().display(),
        std::process::id()
    );
    rec_game.demo_recorder = Some(DemoRecorder::begin(
        &name,
        None,
        &rec_game.behavior,
        &header,
        false,
    ));
    let recorded_history = run_cmds(&mut rec_game, &cmds);
    rec_game.stop_recording();
    let demo_path = format!("{}.lmp", name);
    let demo_bytes = std::fs::read(&demo_path).expect("demo file");
    std::fs::remove_file(&demo_path).ok();

    // Play back through the dispatcher, exactly as -playdemo would.
    let mut play_game = fresh_game(CompatLevel::Boom, 0);
    play_game.gameaction = GameAction::Nothing;
    let replay_path = format!("{}-replay.lmp", name);
    std::fs::write(&replay_path, &demo_bytes).unwrap();
    play_game.defered_play_demo(replay_path.clone());

    let mut playback_history = Vec::new();
    let empty = TicCmdSet {
        ingame: [true, false, false, false],
        ..Default::default()
    };
    for _ in 0..tics + 5 {
        play_game.ticker(&empty);
        play_game.gametic += 1;
        let _ = play_game.take_sounds();
        if !play_game.demoplayback() && play_game.level.is_some() {
            break;
        }
        if play_game.level.is_some() && play_game.demoplayback() {
            playback_history.push(play_game.player_consistency(0));
        }
    }
    std::fs::remove_file(&replay_path).ok();

    // The header resolved the recorded compat level.
    assert_eq!(play_game.behavior.level, CompatLevel::Mbf);

    // Recorded consistency history equals playback history. The
    // demo applies from the first level tic; align and compare.
    assert!(playback_history.len() >= tics - 1, "playback ran short: {}", playback_history.len());
    let n = recorded_history.len().min(playback_history.len());
    assert_eq!(
        &recorded_history[..n],
        &playback_history[..n],
        "demo playback diverged from the recording"
    );
}

#[test]
fn save_round_trip_matches_continued_run() {
    let warmup = scripted_cmds(200, 0xaa);
    let tail = scripted_cmds(200, 0xbb);

    let mut game = fresh_game(CompatLevel::Mbf, 42);
    run_cmds(&mut game, &warmup);

    game.savedescription = "midpoint".to_string();
    let save = serializer::save_game(&game);
    let saved_gametic = game.gametic;

    // Continue the original run.
    let continued = run_cmds(&mut game, &tail);

    // Load into a fresh engine and replay the same tail.
    let mut restored = Game::new(
        behavior(CompatLevel::Mbf, 0),
        GameMode::Commercial,
        WadDirectory::default(),
        MapSet::arena_only(),
    );
    restored.gametic = saved_gametic;
    serializer::load_game(&mut restored, &save, false).expect("load");
    let replayed = run_cmds(&mut restored, &tail);

    assert_eq!(continued, replayed, "loaded run diverged from continuation");
}

#[test]
fn empty_demo_exits_cleanly() {
    // A demo whose tic stream is just the end marker plays as
    // valid-empty.
    let b = behavior(CompatLevel::Mbf21, 9);
    let header = DemoHeader {
        version: 221,
        level: CompatLevel::Mbf21,
        longtics: true,
        skill: Skill::Medium,
        episode: 1,
        map: 1,
        deathmatch: 0,
        consoleplayer: 0,
        playeringame: [true, false, false, false],
        umapinfo_map: None,
    };
    let mut bytes = Vec::new();
    codec::write_header(&mut bytes, &b, &header, false);
    bytes.push(stygia::demo::DEMOMARKER);

    let mut game = fresh_game(CompatLevel::Boom, 0);
    game.gameaction = GameAction::Nothing;
    let path = format!(
        "{}/stygia-empty-{}.lmp",
        std::env::temp_dir().display(),
        std::process::id()
    );
    std::fs::write(&path, &bytes).unwrap();
    game.defered_play_demo(path.clone());

    for _ in 0..5 {
        game.ticker(&TicCmdSet::default());
        game.gametic += 1;
    }
    std::fs::remove_file(&path).ok();

    assert!(!game.demoplayback());
    assert!(game.fatal.is_none());
}

#[test]
fn consistency_stores_low_word_of_x() {
    let mut game = fresh_game(CompatLevel::Mbf, 3);
    let cmds = scripted_cmds(BACKUPTICS + 16, 0xcc);
    // The first tic performs the deferred new-game transition (which
    // clears the netgame flag); flip it afterwards so the consistency
    // path is live for the rest of the run.
    run_cmds(&mut game, &cmds[..1]);
    game.netgame = true;
    run_cmds(&mut game, &cmds[1..]);
    assert!(game.fatal.is_none(), "self-run must stay consistent");

    let id = game.players[0].mobj.unwrap();
    let x = game.level.as_ref().unwrap().thinkers.mobj(id).unwrap().x;
    assert_eq!(game.player_consistency(0), (x & 0xffff) as u16 as i16);
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Random draws touch only their own class cursor.
    #[test]
    fn prop_rng_class_isolation(
        seed in any::<u32>(),
        class_idx in 0usize..stygia::core::rng::NUM_RNG_CLASSES,
        draws in 1usize..200,
    ) {
        let classes = [
            RngClass::Damage, RngClass::PainChance, RngClass::See,
            RngClass::TryWalk, RngClass::Misc, RngClass::Lights,
        ];
        let class = classes[class_idx % classes.len()];

        let mut rng = Rng::new();
        rng.clear(seed, CompatLevel::Mbf21);
        let before = *rng.indices();
        for _ in 0..draws {
            rng.random(class);
        }
        let after = *rng.indices();

        for (i, (&b, &a)) in before.iter().zip(after.iter()).enumerate() {
            if i == class as usize {
                prop_assert_eq!(a, b.wrapping_add(draws as u8));
            } else {
                prop_assert_eq!(a, b);
            }
        }
    }

    /// Any cmd survives the longtics wire format byte-exact.
    #[test]
    fn prop_ticcmd_longtics_roundtrip(
        forward in any::<i8>(),
        side in any::<i8>(),
        angle in any::<i16>(),
        buttons in any::<u8>(),
    ) {
        let cmd = TicCmd {
            forwardmove: forward,
            sidemove: side,
            angleturn: angle,
            buttons,
            ..Default::default()
        };
        let mut buf = Vec::new();
        codec::encode_ticcmd(&mut buf, &cmd, true);
        // The marker byte can only lead a record via forwardmove.
        prop_assume!(forward as u8 != stygia::demo::DEMOMARKER);

        let mut cur = codec::DemoCursor::new(&buf);
        let out = codec::decode_ticcmd(&mut cur, true).unwrap().unwrap();
        prop_assert_eq!(out.forwardmove, forward);
        prop_assert_eq!(out.sidemove, side);
        prop_assert_eq!(out.angleturn, angle);
        prop_assert_eq!(out.buttons, buttons);
    }

    /// Short tics quantize the angle to its high byte, nothing else.
    #[test]
    fn prop_ticcmd_shorttics_quantizes(angle in any::<i16>()) {
        let cmd = TicCmd { angleturn: angle, ..Default::default() };
        let mut buf = Vec::new();
        codec::encode_ticcmd(&mut buf, &cmd, false);
        let mut cur = codec::DemoCursor::new(&buf);
        let out = codec::decode_ticcmd(&mut cur, false).unwrap().unwrap();
        let expected = (((angle.wrapping_add(128) as u16) >> 8) as u16) << 8;
        prop_assert_eq!(out.angleturn as u16, expected);
    }

    /// The resolver is a pure function of its inputs.
    #[test]
    fn prop_resolver_purity(
        level_idx in 0u8..4,
        respawn in any::<bool>(),
        fast in any::<bool>(),
        nomonsters in any::<bool>(),
        dogs in proptest::option::of(0u8..4),
        seed in any::<u32>(),
        netgame in any::<bool>(),
    ) {
        let level = match level_idx {
            0 => CompatLevel::Vanilla,
            1 => CompatLevel::Boom,
            2 => CompatLevel::Mbf,
            _ => CompatLevel::Mbf21,
        };
        let defaults = UserDefaults::default();
        let overrides = Overrides {
            complevel: Some(level),
            respawn,
            fast,
            nomonsters,
            dogs,
            ..Default::default()
        };
        let a = resolver::resolve(&defaults, None, &overrides, seed, netgame);
        let b = resolver::resolve(&defaults, None, &overrides, seed, netgame);
        prop_assert_eq!(a, b);
    }

    /// Boom/MBF options blocks round-trip every toggle they carry.
    #[test]
    fn prop_options_roundtrip(
        monsters_remember in any::<bool>(),
        weapon_recoil in any::<bool>(),
        player_bobbing in any::<bool>(),
        dogs in 0u8..4,
        distfriend in 0i16..1024,
        seed in any::<u32>(),
    ) {
        let mut b = behavior(CompatLevel::Mbf, seed);
        b.monsters_remember = monsters_remember;
        b.weapon_recoil = weapon_recoil;
        b.player_bobbing = player_bobbing;
        b.dogs = dogs;
        b.distfriend = distfriend;

        let mut buf = Vec::new();
        codec::write_options(&mut buf, &b);
        let mut out = behavior(CompatLevel::Mbf, 0);
        let mut cur = codec::DemoCursor::new(&buf);
        codec::read_options(&mut cur, &mut out, 203, true).unwrap();

        prop_assert_eq!(out.monsters_remember, monsters_remember);
        prop_assert_eq!(out.weapon_recoil, weapon_recoil);
        prop_assert_eq!(out.player_bobbing, player_bobbing);
        prop_assert_eq!(out.dogs, dogs);
        prop_assert_eq!(out.distfriend, distfriend);
        prop_assert_eq!(out.rngseed, seed);
    }
}

#[test]
fn multiplayer_runs_stay_in_step() {
    // Two engines fed the same three-player cmd sets act as peers and
    // must agree on every consistency word.
    let build = || {
        let mut g = fresh_game(CompatLevel::Mbf, 777);
        g.netgame = true;
        for slot in 0..3 {
            g.playeringame[slot] = true;
        }
        g
    };
    let mut a = build();
    let mut b = build();

    let mut rng = StdRng::seed_from_u64(31337);
    for _tic in 0..300 {
        let mut set = TicCmdSet::default();
        for slot in 0..3 {
            set.ingame[slot] = true;
            set.cmds[slot] = TicCmd {
                forwardmove: rng.gen_range(-50..=50),
                sidemove: rng.gen_range(-40..=40),
                angleturn: rng.gen_range(-640..=640),
                ..Default::default()
            };
            set.cmds[slot].consistency = a.consistency[slot]
                [(a.gametic / a.ticdup) as usize % BACKUPTICS];
        }
        let mut set_b = set;
        for slot in 0..3 {
            set_b.cmds[slot].consistency =
                b.consistency[slot][(b.gametic / b.ticdup) as usize % BACKUPTICS];
        }

        a.ticker(&set);
        a.gametic += 1;
        b.ticker(&set_b);
        b.gametic += 1;
        let _ = (a.take_sounds(), b.take_sounds());

        assert!(a.fatal.is_none(), "engine A aborted: {:?}", a.fatal);
        assert!(b.fatal.is_none(), "engine B aborted: {:?}", b.fatal);
        for slot in 0..3 {
            assert_eq!(
                a.player_consistency(slot),
                b.player_consistency(slot),
                "slot {} diverged",
                slot
            );
        }
    }
}
