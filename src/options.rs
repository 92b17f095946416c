//! Command-Line Options
//!
//! Argv is parsed exactly once, at startup, into this struct;
//! downstream code reads fields and never re-scans the argument list.

use crate::compat::{CompatLevel, GameVersion};
use crate::game::Skill;

/// Everything the command line can configure.
#[derive(Clone, Debug, Default)]
pub struct Options {
    // Files
    pub iwad: Option<String>,
    pub files: Vec<String>,
    pub dehs: Vec<String>,
    /// JSON lump manifest standing in for the WAD loader.
    pub manifest: Option<String>,

    // Demos
    pub playdemo: Option<String>,
    pub timedemo: Option<String>,
    pub fastdemo: Option<String>,
    pub record: Option<String>,
    pub maxdemo_kib: Option<usize>,
    pub longtics: bool,
    pub shorttics: bool,

    // Saves
    pub loadgame: Option<u8>,

    // Behavior overrides
    pub complevel: Option<CompatLevel>,
    pub gameversion: Option<GameVersion>,
    pub skill: Option<Skill>,
    pub warp: Option<(u32, u32)>,
    pub fast: bool,
    pub respawn: bool,
    pub nomonsters: bool,
    pub deathmatch: bool,
    pub solo_net: bool,
    pub dogs: Option<u8>,
    pub beta: bool,
    pub levelstat: bool,

    // Net layer
    pub server: bool,
    pub privateserver: bool,
    pub connect: Option<String>,
    pub autojoin: bool,
    pub extratics: u32,
    pub dup: u32,
    pub drone: bool,
    pub oldsync: bool,
}

impl Options {
    /// Parse an argument list (without the program name).
    pub fn parse(args: &[String]) -> Result<Options, String> {
        let mut o = Options {
            dup: 1,
            ..Default::default()
        };

        let mut i = 0;
        let next = |args: &[String], i: &mut usize, flag: &str| -> Result<String, String> {
            *i += 1;
            args.get(*i)
                .cloned()
                .ok_or_else(|| format!("{} requires an argument", flag))
        };

        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "-iwad" => o.iwad = Some(next(args, &mut i, arg)?),
                "-file" => {
                    // Consume values until the next flag.
                    while i + 1 < args.len() && !args[i + 1].starts_with('-') {
                        i += 1;
                        o.files.push(args[i].clone());
                    }
                }
                "-deh" => {
                    while i + 1 < args.len() && !args[i + 1].starts_with('-') {
                        i += 1;
                        o.dehs.push(args[i].clone());
                    }
                }
                "-manifest" => o.manifest = Some(next(args, &mut i, arg)?),

                "-playdemo" => o.playdemo = Some(next(args, &mut i, arg)?),
                "-timedemo" => o.timedemo = Some(next(args, &mut i, arg)?),
                "-fastdemo" => o.fastdemo = Some(next(args, &mut i, arg)?),
                "-record" => o.record = Some(next(args, &mut i, arg)?),
                "-maxdemo" => {
                    let v = next(args, &mut i, arg)?;
                    o.maxdemo_kib =
                        Some(v.parse().map_err(|_| format!("bad -maxdemo value {:?}", v))?);
                }
                "-longtics" => o.longtics = true,
                "-shorttics" => o.shorttics = true,

                "-loadgame" => {
                    let v = next(args, &mut i, arg)?;
                    o.loadgame =
                        Some(v.parse().map_err(|_| format!("bad -loadgame slot {:?}", v))?);
                }

                "-complevel" => {
                    let v = next(args, &mut i, arg)?;
                    let (level, exe) = CompatLevel::parse_named(&v)
                        .ok_or_else(|| format!("unknown compatibility level {:?}", v))?;
                    o.complevel = Some(level);
                    if let Some(exe) = exe {
                        o.gameversion = Some(exe);
                    }
                }
                "-gameversion" => {
                    let v = next(args, &mut i, arg)?;
                    o.gameversion = Some(
                        GameVersion::parse(&v)
                            .ok_or_else(|| format!("unknown game version {:?}", v))?,
                    );
                }
                "-skill" => {
                    let v = next(args, &mut i, arg)?;
                    let n: u8 = v.parse().map_err(|_| format!("bad -skill {:?}", v))?;
                    if !(1..=5).contains(&n) {
                        return Err(format!("-skill must be 1..5, got {}", n));
                    }
                    o.skill = Skill::from_index(n - 1);
                }
                "-warp" => {
                    let first = next(args, &mut i, arg)?;
                    let a: u32 = first.parse().map_err(|_| format!("bad -warp {:?}", first))?;
                    // Two numeric args mean E M, one means MAP.
                    if i + 1 < args.len() {
                        if let Ok(b) = args[i + 1].parse::<u32>() {
                            i += 1;
                            o.warp = Some((a, b));
                        } else {
                            o.warp = Some((1, a));
                        }
                    } else {
                        o.warp = Some((1, a));
                    }
                }
                "-fast" => o.fast = true,
                "-respawn" => o.respawn = true,
                "-nomonsters" => o.nomonsters = true,
                "-deathmatch" => o.deathmatch = true,
                "-solo-net" => o.solo_net = true,
                "-dog" => o.dogs = Some(1),
                "-dogs" => {
                    let v = next(args, &mut i, arg)?;
                    o.dogs = Some(v.parse().map_err(|_| format!("bad -dogs count {:?}", v))?);
                }
                "-beta" => o.beta = true,
                "-levelstat" => o.levelstat = true,

                "-server" => o.server = true,
                "-privateserver" => {
                    o.server = true;
                    o.privateserver = true;
                }
                "-connect" => o.connect = Some(next(args, &mut i, arg)?),
                "-autojoin" => o.autojoin = true,
                "-extratics" => {
                    let v = next(args, &mut i, arg)?;
                    o.extratics = v.parse().map_err(|_| format!("bad -extratics {:?}", v))?;
                }
                "-dup" => {
                    let v = next(args, &mut i, arg)?;
                    o.dup = v.parse().map_err(|_| format!("bad -dup {:?}", v))?;
                    if !(1..=12).contains(&o.dup) {
                        return Err(format!("invalid ticdup value ({})", o.dup));
                    }
                }
                "-drone" => o.drone = true,
                "-oldsync" => o.oldsync = true,

                other => return Err(format!("unknown option {:?}", other)),
            }
            i += 1;
        }

        if o.longtics && o.shorttics {
            return Err("-longtics and -shorttics are mutually exclusive".to_string());
        }

        Ok(o)
    }

    /// The demo to play, from whichever flag asked for one.
    pub fn demo_to_play(&self) -> Option<&str> {
        self.playdemo
            .as_deref()
            .or(self.timedemo.as_deref())
            .or(self.fastdemo.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Options::parse(&owned)
    }

    #[test]
    fn test_demo_flags() {
        let o = parse(&["-playdemo", "demo1", "-maxdemo", "512"]).unwrap();
        assert_eq!(o.playdemo.as_deref(), Some("demo1"));
        assert_eq!(o.maxdemo_kib, Some(512));
        assert_eq!(o.demo_to_play(), Some("demo1"));

        let o = parse(&["-timedemo", "demo2"]).unwrap();
        assert_eq!(o.demo_to_play(), Some("demo2"));
    }

    #[test]
    fn test_complevel_names_set_gameversion() {
        let o = parse(&["-complevel", "tnt"]).unwrap();
        assert_eq!(o.complevel, Some(CompatLevel::Vanilla));
        assert_eq!(o.gameversion, Some(GameVersion::Final));

        let o = parse(&["-complevel", "mbf21"]).unwrap();
        assert_eq!(o.complevel, Some(CompatLevel::Mbf21));
        assert_eq!(o.gameversion, None);

        assert!(parse(&["-complevel", "bogus"]).is_err());
    }

    #[test]
    fn test_warp_forms() {
        let o = parse(&["-warp", "2", "4"]).unwrap();
        assert_eq!(o.warp, Some((2, 4)));

        let o = parse(&["-warp", "15"]).unwrap();
        assert_eq!(o.warp, Some((1, 15)));

        let o = parse(&["-warp", "3", "-fast"]).unwrap();
        assert_eq!(o.warp, Some((1, 3)));
        assert!(o.fast);
    }

    #[test]
    fn test_skill_range() {
        let o = parse(&["-skill", "4"]).unwrap();
        assert_eq!(o.skill, Some(Skill::Hard));
        assert!(parse(&["-skill", "0"]).is_err());
        assert!(parse(&["-skill", "6"]).is_err());
    }

    #[test]
    fn test_file_lists() {
        let o = parse(&["-file", "a.wad", "b.wad", "-deh", "fix.deh"]).unwrap();
        assert_eq!(o.files, vec!["a.wad", "b.wad"]);
        assert_eq!(o.dehs, vec!["fix.deh"]);
    }

    #[test]
    fn test_dup_bounds() {
        assert_eq!(parse(&["-dup", "3"]).unwrap().dup, 3);
        assert!(parse(&["-dup", "0"]).is_err());
        assert!(parse(&["-dup", "13"]).is_err());
        // Default sample rate is every tic.
        assert_eq!(parse(&[]).unwrap().dup, 1);
    }

    #[test]
    fn test_tic_width_conflict() {
        assert!(parse(&["-longtics", "-shorttics"]).is_err());
        assert!(parse(&["-longtics"]).unwrap().longtics);
    }

    #[test]
    fn test_dogs_forms() {
        assert_eq!(parse(&["-dog"]).unwrap().dogs, Some(1));
        assert_eq!(parse(&["-dogs", "3"]).unwrap().dogs, Some(3));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(parse(&["-frobnicate"]).is_err());
        assert!(parse(&["-iwad"]).is_err());
    }

    #[test]
    fn test_net_flags() {
        let o = parse(&["-server", "-extratics", "2", "-oldsync", "-drone"]).unwrap();
        assert!(o.server && o.oldsync && o.drone);
        assert_eq!(o.extratics, 2);

        let o = parse(&["-connect", "host:2342", "-autojoin"]).unwrap();
        assert_eq!(o.connect.as_deref(), Some("host:2342"));
        assert!(o.autojoin);
    }
}
