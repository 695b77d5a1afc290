mod config_files;
mod forum_client;
mod import_run;
