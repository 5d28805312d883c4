pub mod synthetic_rve;
