mod backup;
mod goal;
mod helpers;
mod profile;
mod stats;
mod status;
mod weight;

pub(crate) use backup::{cmd_export, cmd_import};
pub(crate) use goal::{cmd_goal_delete, cmd_goal_history, cmd_goal_set, cmd_goal_show};
pub(crate) use profile::{cmd_profile_clear, cmd_profile_set, cmd_profile_show};
pub(crate) use stats::cmd_stats;
pub(crate) use status::cmd_status;
pub(crate) use weight::{
    cmd_weight_clear, cmd_weight_delete, cmd_weight_edit, cmd_weight_history, cmd_weight_log,
};
