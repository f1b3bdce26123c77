//! 分裂阶段消融实验: 在合成的 "两球靠近" 序列上比较不同分裂参数.

mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Warn).unwrap();
    runner::run().analyze().expect("Writing report error");
}
