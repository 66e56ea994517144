// Scenario tests for the plan execution engine, driven through recording fakes

pub mod support;

#[cfg(test)]
mod local_fs_tests;
#[cfg(test)]
mod recovery_tests;
#[cfg(test)]
mod scenario_tests;
