mod common;

use common::{harness, read_csv, Fixture};
use onac_core::Key;
use onac_experiment::Task;

fn codes(h: &common::Harness) -> String {
    h.trigger.codes().iter().map(|c| c.as_char()).collect()
}

#[test]
fn mmn_plays_each_row_with_its_trigger() {
    let fixture = Fixture::new("mmn");
    fixture.file(
        "mismatched_negativity_task/fixed_stims.csv",
        "Trigger,Condition,Sound,Timing\n\
         X,warmup,standard,0.5\n\
         A,standard,standard,0.5\n\
         B,deviant,deviant,0.75\n\
         A,standard,standard,0.5\n",
    );
    fixture.instructions("mismatched_negativity_task/mismatched_negativity_instructions.csv");
    fixture.wav("mismatched_negativity_task/auditory_stimuli/standard.wav");
    fixture.wav("mismatched_negativity_task/auditory_stimuli/deviant.wav");
    let mut h = harness(fixture.config(), &[]);

    h.session.bootstrap().unwrap();
    Task::Mmn.run(&mut h.session).unwrap();
    h.session.shutdown().unwrap();

    assert_eq!(codes(&h), "ZABA");
    assert_eq!(h.audio.played(), ["standard", "deviant", "standard"]);
    let rows = read_csv(&fixture.data_file("mismatched_negativity_task"));
    assert_eq!(rows[0], ["condition", "sound"]);
    assert_eq!(rows[1..], [["standard", "standard"], ["deviant", "deviant"], ["standard", "standard"]]);

    let wide = read_csv(&h.session.stem_with("csv"));
    assert!(wide[0].iter().any(|c| c == "Condition"));
    assert!(wide[0].iter().any(|c| c == "frameRate"));
    assert!((h.session.info.frame_rate.unwrap() - 60.0).abs() < 0.5);
}

#[test]
fn mmn_missing_sound_fails_before_any_trial() {
    let fixture = Fixture::new("mmn-missing");
    fixture.file(
        "mismatched_negativity_task/fixed_stims.csv",
        "Trigger,Condition,Sound,Timing\nX,warmup,standard,0.5\nA,standard,standard,0.5\n",
    );
    let mut h = harness(fixture.config(), &[]);

    let err = Task::Mmn.run(&mut h.session).unwrap_err();

    assert!(matches!(err, onac_core::Error::Asset { .. }));
    assert!(h.trigger.sent().is_empty());
    assert_eq!(h.session.display.flips(), 0);
}

#[test]
fn mmn_negative_timing_fails_before_any_trial() {
    let fixture = Fixture::new("mmn-negative-timing");
    fixture.file(
        "mismatched_negativity_task/fixed_stims.csv",
        "Trigger,Condition,Sound,Timing\n\
         X,warmup,standard,0.5\n\
         A,standard,standard,0.5\n\
         B,deviant,standard,-0.5\n",
    );
    fixture.wav("mismatched_negativity_task/auditory_stimuli/standard.wav");
    let mut h = harness(fixture.config(), &[]);

    let err = Task::Mmn.run(&mut h.session).unwrap_err();

    match err {
        onac_core::Error::Asset { path, reason } => {
            assert!(path.ends_with("fixed_stims.csv"));
            assert!(reason.starts_with("Timing -0.5"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.trigger.sent().is_empty());
    assert_eq!(h.session.display.flips(), 0);
}

#[test]
fn motor_rest_rows_run_fixed_and_others_time_out() {
    let fixture = Fixture::new("motor");
    fixture.wav("naturalistic_motor_task/rest.wav");
    fixture.wav("naturalistic_motor_task/wave.wav");
    fixture.file(
        "naturalistic_motor_task/naturalistic_motor_task_stimuli.csv",
        "stimulus,trigger,end_trigger,instruction\n\
         Rest,C,c,naturalistic_motor_task/rest.wav\n\
         Wave,W,w,naturalistic_motor_task/wave.wav\n",
    );
    let mut config = fixture.config();
    config.motor.repetitions = 2;
    config.motor.baseline_secs = 1.0;
    config.motor.rest_secs = 2.0;
    config.motor.max_response_secs = 3.0;
    let mut h = harness(config, &[]);

    Task::Motor.run(&mut h.session).unwrap();

    assert_eq!(codes(&h), "ZCcWwCcWw");
    let sent = h.trigger.sent();
    let rest = (sent[2].1 - sent[1].1) as f64 / 1e9;
    assert!((1.95..2.05).contains(&rest), "rest lasted {rest}");
    let rows = read_csv(&fixture.data_file("naturalistic_motor_task"));
    assert_eq!(rows[0], ["Stimulus", "Duration", "Trial"]);
    assert_eq!(rows[1..], [["Rest", "", "0"], ["Wave", "", "0"], ["Rest", "", "1"], ["Wave", "", "1"]]);
}

#[test]
fn resting_state_brackets_the_block_with_g_and_h() {
    let fixture = Fixture::new("resting");
    fixture.instructions("resting_state/resting_state_instructions.csv");
    let mut config = fixture.config();
    config.resting.minutes = 0.05;
    let mut h = harness(config, &[]);

    Task::Resting.run(&mut h.session).unwrap();

    assert_eq!(codes(&h), "ZGH");
    let sent = h.trigger.sent();
    let block = (sent[2].1 - sent[1].1) as f64 / 1e9;
    assert!((4.95..5.15).contains(&block), "block lasted {block}");
    assert_eq!(h.audio.played(), ["tone 261.63 Hz"]);
}

fn memory_fixture(name: &str) -> Fixture {
    let fixture = Fixture::new(name);
    fixture.instructions("memory_task/memory_task_instructions.csv");
    fixture.instructions("memory_task/memory_task_instructions_recall.csv");
    let header = "filename,corr_ans,condition_setting,condition_memory\n";
    fixture.file(
        "memory_task/official_stimuli/practice_stimuli/practice.csv",
        &format!("{header}p1.jpg,left,indoor,new\np2.jpg,right,outdoor,new\np3.jpg,left,indoor,new\n"),
    );
    fixture.file(
        "memory_task/official_stimuli/stimuli/encoded.csv",
        &format!("{header}stimuli/e1.jpg,left,indoor,old\nstimuli/e2.jpg,right,outdoor,old\nstimuli/e3.jpg,left,indoor,old\n"),
    );
    fixture.file(
        "memory_task/official_stimuli/stimuli/recall.csv",
        &format!("{header}stimuli/e1.jpg,left,indoor,old\nstimuli/n1.jpg,right,outdoor,new\n"),
    );
    for image in ["p1", "p2", "p3"] {
        fixture.file(&format!("memory_task/official_stimuli/practice_stimuli/{image}.jpg"), "");
    }
    for image in ["e1", "e2", "e3", "n1"] {
        fixture.file(&format!("memory_task/official_stimuli/stimuli/{image}.jpg"), "");
    }
    fixture
}

#[test]
fn memory_runs_both_phases_in_blocks() {
    let fixture = memory_fixture("memory");
    let mut config = fixture.config();
    config.memory.practice_trials = 2;
    let mut h = harness(config, &[]);

    Task::Memory.run(&mut h.session).unwrap();

    // Three encoding trials in blocks of two, then one recall block.
    assert_eq!(codes(&h), "ZJJL");
    let rows = read_csv(&fixture.data_file("memory_task"));
    assert_eq!(rows[0].len(), 12);
    assert_eq!(rows.len(), 1 + 3 + 2);
    let phases: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(phases, ["encoding", "encoding", "encoding", "recall", "recall"]);
    let mut encoded: Vec<&str> = rows[1..4].iter().map(|r| r[4].as_str()).collect();
    encoded.sort();
    assert_eq!(encoded, ["0", "1", "2"]);
    for row in &rows[1..] {
        // No keys were pressed: every response cell stays empty.
        assert!(row[5..9].iter().all(String::is_empty));
        assert!(row[10..].iter().all(String::is_empty));
    }
}

#[test]
fn memory_missing_image_fails_fast() {
    let fixture = memory_fixture("memory-missing");
    std::fs::remove_file(fixture.path("memory_task/official_stimuli/practice_stimuli/p1.jpg")).unwrap();
    let mut h = harness(fixture.config(), &[]);

    let err = Task::Memory.run(&mut h.session).unwrap_err();

    match err {
        onac_core::Error::Asset { path, .. } => assert!(path.ends_with("p1.jpg")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn visual_detects_the_dot_while_it_shows() {
    let fixture = Fixture::new("visual");
    fixture.instructions("visual_stimulation/instructions.csv");
    fixture.file(
        "visual_stimulation/visual_stimulation_stimuli.csv",
        "frequency,trigger,orientation1,orientation2,pos1,pos2,side\n\
         7.5,V,180,360,-0.5,0,left\n\
         5,W,0,180,0.5,0,right\n",
    );
    // Space every half second: only presses inside the dot window count.
    let script: Vec<(f64, Key)> = (1..240).map(|i| (i as f64 * 0.5, Key::Space)).collect();
    let mut h = harness(fixture.config(), &script);

    Task::Visual.run(&mut h.session).unwrap();

    assert_eq!(codes(&h), "ZVW");
    let rows = read_csv(&fixture.data_file("visual_stim"));
    assert_eq!(rows[0], ["frequency", "side", "detected", "reaction_time"]);
    assert_eq!(rows.len(), 3);
    for row in &rows[1..] {
        assert_eq!(row[2], "1");
        let rt: f64 = row[3].parse().unwrap();
        assert!((0.0..0.52).contains(&rt), "rt {rt}");
    }
}

#[test]
fn bnirs_abort_keeps_completed_trials_only() {
    let fixture = Fixture::new("bnirs");
    let mut config = fixture.config();
    config.visual_bnirs.trials = 4;
    let mut h = harness(config, &[(60.0, Key::Escape)]);

    h.session.bootstrap().unwrap();
    let err = Task::VisualBnirs.run(&mut h.session).unwrap_err();
    h.session.shutdown().unwrap();

    assert!(err.is_escape());
    assert!(h.trigger.sent().is_empty());
    let rows = read_csv(&fixture.data_file("visual_stim_bNIRS"));
    assert_eq!(rows.len(), 1 + 2);
    assert!(rows[1..].iter().all(|r| r[0] == "0" && r[1].is_empty()));
    assert!(h.session.display.is_closed());
    assert!(h.timer_secs() < 62.0);
}
