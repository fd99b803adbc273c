#[derive(strum_macros::Display)]
pub enum Constants {
    #[strum(serialize = "datastore")]
    DatastoreDir,

    #[strum(serialize = "pbs_dbclose")]
    StopMarkerFile,

    #[strum(serialize = "server_priv")]
    ServerPrivDir,

    #[strum(serialize = "svrlive")]
    LivenessFile,

    #[strum(serialize = "KURA_CONFIG_DIR")]
    ConfigDirEnv,

    #[strum(serialize = "KURA_RUN_MODE")]
    RunModeEnv,

    #[strum(serialize = "kura")]
    EnvironmentPrefix,
}
