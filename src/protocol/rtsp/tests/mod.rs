mod server_codec;
