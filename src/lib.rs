pub mod math {
    pub mod traits;
    pub mod integer;
    pub mod rational;
    pub mod matrix;
}
pub mod optimisation_algorithms {
    pub mod config;
    pub mod basis;
    pub mod bfs;
    pub mod tableau;
    pub mod tableau_f64;
    pub mod tableau_exact;
    pub mod lp_tableau;
    pub mod lp_solve;
    pub mod vertex_enum;
    pub mod double_vertex_enum;
    pub mod lemke;
}
pub mod game {
    pub mod bimatrix;
    pub mod mixed_profile;
    pub mod behav_profile;
}
