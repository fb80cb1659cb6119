mod cluster_contract;
mod race_case1;
mod race_case2;
mod teardown_case;
