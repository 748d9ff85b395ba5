use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "segment")]
#[command(about = "脑部MRI四模态肿瘤分割工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> anyhow::Result<()> {
        match self.command {
            Commands::Run(ref mut v) => v.run(),
            Commands::Combine(ref mut v) => v.run(),
            Commands::Labels(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 对zip压缩包中的四模态MRI执行完整的分割流程。
    Run(crate::subcmd_impls::run::Run),
    /// 预处理目录中的四个模态并将组合体数据保存为npy文件。
    Combine(crate::subcmd_impls::combine::Combine),
    /// 统计标注文件适配后各类别的体素数，以JSON输出。
    Labels(crate::subcmd_impls::labels::Labels),
}
