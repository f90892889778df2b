macro_rules! list {
    ($($module:ident),+ $(,)?) => {
        $(
            pub mod $module;
        )+

        pub fn list() -> Vec<crate::utils::poise::Command> {
            let mut vec = Vec::new();

            $(
                vec.extend($module::commands());
            )+

            vec
        }
    };
}

list! {
    anime,
    mal,
    image,
    rolecall
}

trait LogCommands {
    async fn log_command(&self);
}

impl LogCommands for crate::utils::Context<'_> {
    async fn log_command(&self) {
        let channel = self
            .channel_id()
            .name(self.http())
            .await
            .map_or("dms".to_string(), |c| format!("#{c}"));
        tracing::info!(
            "@{} ({}): {}",
            self.author().name,
            channel,
            self.invocation_string()
        );
    }
}
