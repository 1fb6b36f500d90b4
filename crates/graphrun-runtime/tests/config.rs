use graphrun_core::ProfilingLevel;
use graphrun_iotensor::{InputDataType, OutputDataType};
use graphrun_runtime::{parse_op_packages, split_list, RunConfig, RunState};

#[test]
fn defaults() {
    let config = RunConfig::default();
    assert!(config.dump_outputs);
    assert!(!config.manifest.allow_ragged);
    assert_eq!(config.input_data_type, InputDataType::Float);
    assert_eq!(config.output_data_type, OutputDataType::FloatOnly);
    assert_eq!(config.profiling_level, ProfilingLevel::Off);
}

#[test]
fn comma_lists_drop_empty_entries() {
    assert_eq!(split_list("a.txt,b.txt"), ["a.txt", "b.txt"]);
    assert_eq!(split_list(" a.txt ,, b.txt,"), ["a.txt", "b.txt"]);
    assert!(split_list("").is_empty());
}

#[test]
fn op_package_lists() {
    let packages = parse_op_packages("libA.so:ProvA,libB.so:ProvB:HTP").unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[1].target.as_deref(), Some("HTP"));

    let err = parse_op_packages("libA.so:ProvA,libB.so").unwrap_err();
    assert!(err.to_string().contains("libB.so"));
}

#[test]
fn terminal_states() {
    assert!(RunState::Done.is_terminal());
    assert!(RunState::Failed.is_terminal());
    assert!(!RunState::Executing.is_terminal());
    assert_eq!(RunState::GraphsFinalized.to_string(), "graphs finalized");
}

#[test]
fn saved_binary_lands_in_the_output_root() {
    let mut config = RunConfig::default();
    assert_eq!(config.saved_binary_path(), None);
    config.output_dir = "/tmp/run".into();
    config.save_binary_name = Some("net".to_string());
    assert_eq!(
        config.saved_binary_path(),
        Some(std::path::PathBuf::from("/tmp/run/net.bin"))
    );
}
